//! Attribute computation
//!
//! Computes every key of one domain for one node straight from the
//! document. Nothing here touches the cache; the context decides when a
//! computed domain is stored and shipped.

use fos_dom::{Document, ElementData, NodeId};

use crate::aria::AriaRole;
use crate::{ActionKind, CacheDomain, CacheKey, CachePoint, CacheRect, CacheValue};

/// Inherited properties that make up `text-style`
pub const TEXT_STYLE_PROPERTIES: &[&str] = &[
    "color",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "text-decoration",
];

/// Compute the keys of a single domain for `node`.
///
/// Disconnected nodes and non-element nodes yield nothing, except the
/// document node which carries the APZ domain of a top-level document.
pub fn compute_domain(doc: &Document, node: NodeId, domain: CacheDomain) -> Vec<(CacheKey, CacheValue)> {
    debug_assert!(domain.is_single(), "compute_domain expects one domain, got {domain}");

    if domain == CacheDomain::APZ {
        return visual_viewport(doc, node);
    }
    let Some(el) = doc.element(node) else {
        return Vec::new();
    };
    let role = AriaRole::of(el);
    let mut out = Vec::new();

    match domain {
        CacheDomain::NAME_AND_DESCRIPTION => name_and_description(doc, node, el, role, &mut out),
        CacheDomain::VALUE => value(doc, node, el, role, &mut out),
        CacheDomain::TEXT => text(doc, node, &mut out),
        CacheDomain::STATE => state(doc, node, el, role, &mut out),
        CacheDomain::GROUP_INFO => group_info(doc, node, el, role, &mut out),
        CacheDomain::ACTIONS => actions(doc, node, el, role, &mut out),
        CacheDomain::STYLE => {
            let display = el.style_property("display").unwrap_or_else(|| default_display(&el.tag));
            out.push((CacheKey::Display, CacheValue::str(display)));
        }
        CacheDomain::SCROLL_POSITION => {
            let (x, y) = el.scroll_offset();
            if (x, y) != (0, 0) {
                out.push((CacheKey::ScrollPosition, CacheValue::point(x, y)));
            }
        }
        CacheDomain::DOM_NODE_ID_AND_CLASS => {
            if let Some(id) = el.get_attr("id").filter(|v| !v.is_empty()) {
                out.push((CacheKey::DomNodeId, CacheValue::str(id)));
            }
            if let Some(class) = el.get_attr("class").filter(|v| !v.is_empty()) {
                out.push((CacheKey::ClassName, CacheValue::str(class)));
            }
        }
        CacheDomain::BOUNDS => {
            if let Some(r) = el.layout_rect() {
                let rect = CacheRect { x: r.x, y: r.y, width: r.width, height: r.height };
                out.push((CacheKey::Bounds, CacheValue::Rect(rect)));
            }
        }
        _ => {}
    }
    out
}

fn visual_viewport(doc: &Document, node: NodeId) -> Vec<(CacheKey, CacheValue)> {
    if node != doc.root() || !doc.is_top_level() {
        return Vec::new();
    }
    let viewport = doc.viewport();
    let offset = CachePoint { x: viewport.offset_x, y: viewport.offset_y };
    vec![(CacheKey::VisualViewportOffset, CacheValue::Point(offset))]
}

fn name_and_description(
    doc: &Document,
    node: NodeId,
    el: &ElementData,
    role: AriaRole,
    out: &mut Vec<(CacheKey, CacheValue)>,
) {
    let title = non_empty(el.get_attr("title"));
    let mut name = non_empty(el.get_attr("aria-label")).map(str::to_string);

    if name.is_none() && el.tag == "img" {
        name = non_empty(el.get_attr("alt")).map(str::to_string);
    }
    if name.is_none() && el.tag == "input" && role == AriaRole::Button {
        name = non_empty(el.get_attr("value")).map(str::to_string);
    }
    if name.is_none() && role.name_from_content() {
        let text = collapse_whitespace(&doc.tree().text_content(node));
        if !text.is_empty() {
            name = Some(text);
        }
    }
    let title_is_name = name.is_none() && title.is_some();
    if title_is_name {
        name = title.map(str::to_string);
    }

    if let Some(name) = name {
        out.push((CacheKey::Name, CacheValue::Str(name)));
    }
    let description = non_empty(el.get_attr("aria-description"))
        .or(if title_is_name { None } else { title });
    if let Some(description) = description {
        out.push((CacheKey::Description, CacheValue::str(description)));
    }
}

fn value(doc: &Document, node: NodeId, el: &ElementData, role: AriaRole, out: &mut Vec<(CacheKey, CacheValue)>) {
    if let Some(now) = non_empty(el.get_attr("aria-valuenow")) {
        out.push((CacheKey::Value, CacheValue::str(now)));
        return;
    }
    match el.tag.as_str() {
        "textarea" => out.push((CacheKey::Value, CacheValue::Str(doc.tree().text_content(node)))),
        "input" if role.is_text_control() || role == AriaRole::Slider => {
            out.push((CacheKey::Value, CacheValue::str(el.get_attr("value").unwrap_or(""))));
        }
        _ => {}
    }
}

fn text(doc: &Document, node: NodeId, out: &mut Vec<(CacheKey, CacheValue)>) {
    let tree = doc.tree();
    let chain: Vec<&ElementData> = std::iter::once(node)
        .chain(tree.ancestors(node))
        .filter_map(|id| tree.element(id))
        .collect();

    // Nearest `lang` wins, an empty one means unknown
    let language = chain.iter().find_map(|el| el.get_attr("lang"));
    if let Some(lang) = non_empty(language) {
        out.push((CacheKey::Language, CacheValue::str(lang)));
    }

    let mut style: Vec<(&str, &str)> = TEXT_STYLE_PROPERTIES
        .iter()
        .filter_map(|prop| {
            chain
                .iter()
                .find_map(|el| el.style_property(prop))
                .map(|value| (*prop, value))
        })
        .collect();
    if !style.is_empty() {
        style.sort_unstable();
        let rendered: String = style.iter().map(|(p, v)| format!("{p}:{v};")).collect();
        out.push((CacheKey::TextStyle, CacheValue::Str(rendered)));
    }
}

fn state(doc: &Document, node: NodeId, el: &ElementData, role: AriaRole, out: &mut Vec<(CacheKey, CacheValue)>) {
    let form_control = role.is_checkable() || role.is_text_control() || role == AriaRole::ComboBox;
    let required = el.has_attr("required") || aria_true(el, "aria-required");
    let checked = is_checked(el);

    if form_control || required {
        out.push((CacheKey::Required, CacheValue::Bool(required)));
    }

    let invalid = aria_true(el, "aria-invalid")
        || (required && role.is_checkable() && !checked)
        || (required && role.is_text_control() && field_is_empty(doc, node, el));
    if form_control || invalid {
        out.push((CacheKey::Invalid, CacheValue::Bool(invalid)));
    }

    if role.is_checkable() {
        out.push((CacheKey::Checked, CacheValue::Bool(checked)));
    }
    if role == AriaRole::Option {
        let selected = el.has_attr("selected") || aria_true(el, "aria-selected");
        out.push((CacheKey::Selected, CacheValue::Bool(selected)));
    }
    if role.is_widget() || el.has_attr("tabindex") {
        out.push((CacheKey::Focused, CacheValue::Bool(doc.focused() == Some(node))));
    }
}

fn group_info(doc: &Document, node: NodeId, el: &ElementData, role: AriaRole, out: &mut Vec<(CacheKey, CacheValue)>) {
    let tree = doc.tree();
    let mut posinset = None;
    let mut setsize = None;
    let mut level = None;

    if role.is_set_item() {
        if let Some(parent) = tree.parent(node) {
            let items: Vec<NodeId> = tree
                .children(parent)
                .filter(|&c| tree.element(c).is_some_and(|e| AriaRole::of(e).is_set_item()))
                .collect();
            if let Some(idx) = items.iter().position(|&c| c == node) {
                posinset = Some(idx as i32 + 1);
                setsize = Some(items.len() as i32);
            }
        }
        let depth = tree
            .ancestors(node)
            .filter(|&a| tree.element(a).is_some_and(|e| AriaRole::of(e).is_set_container()))
            .count();
        if depth > 0 {
            level = Some(depth as i32);
        }
    } else if role == AriaRole::Heading {
        level = Some(heading_level(&el.tag));
    }

    let posinset = positive_int(el, "aria-posinset").or(posinset);
    let setsize = positive_int(el, "aria-setsize").or(setsize);
    let level = positive_int(el, "aria-level").or(level);

    if let Some(v) = posinset {
        out.push((CacheKey::PosInSet, CacheValue::Int(v)));
    }
    if let Some(v) = setsize {
        out.push((CacheKey::SetSize, CacheValue::Int(v)));
    }
    if let Some(v) = level {
        out.push((CacheKey::Level, CacheValue::Int(v)));
    }
}

fn actions(doc: &Document, node: NodeId, el: &ElementData, role: AriaRole, out: &mut Vec<(CacheKey, CacheValue)>) {
    if let Some(key) = non_empty(el.get_attr("accesskey")) {
        out.push((CacheKey::AccessKey, CacheValue::str(key)));
    }

    let action = match role {
        AriaRole::Button | AriaRole::MenuItem | AriaRole::Tab => Some(ActionKind::Press),
        AriaRole::Checkbox | AriaRole::Switch if is_checked(el) => Some(ActionKind::Uncheck),
        AriaRole::Checkbox | AriaRole::Switch => Some(ActionKind::Check),
        AriaRole::Radio | AriaRole::Option | AriaRole::TreeItem => Some(ActionKind::Select),
        AriaRole::Link => Some(ActionKind::Jump),
        AriaRole::Summary => {
            let open = doc
                .tree()
                .parent(node)
                .and_then(|p| doc.element(p))
                .is_some_and(|p| p.tag == "details" && p.has_attr("open"));
            Some(if open { ActionKind::Collapse } else { ActionKind::Expand })
        }
        _ if el.has_attr("onclick") => Some(ActionKind::Click),
        _ => None,
    };
    if let Some(action) = action {
        out.push((CacheKey::PrimaryAction, CacheValue::Action(action)));
    }

    if el.tag == "img" && el.has_attr("longdesc") {
        out.push((CacheKey::HasLongdesc, CacheValue::Bool(true)));
    }
}

/// CSS `display` of a tag without author style
fn default_display(tag: &str) -> &'static str {
    match tag {
        "head" | "script" | "style" | "template" | "title" | "meta" | "link" => "none",
        "li" | "summary" => "list-item",
        "table" => "table",
        "tr" => "table-row",
        "td" | "th" => "table-cell",
        "input" | "button" | "select" | "textarea" | "img" => "inline-block",
        "html" | "body" | "div" | "p" | "ul" | "ol" | "menu" | "section" | "article" | "nav"
        | "header" | "footer" | "main" | "aside" | "form" | "fieldset" | "details" | "h1" | "h2"
        | "h3" | "h4" | "h5" | "h6" | "blockquote" | "pre" | "figure" => "block",
        _ => "inline",
    }
}

fn heading_level(tag: &str) -> i32 {
    tag.strip_prefix('h')
        .and_then(|n| n.parse().ok())
        .filter(|n| (1..=6).contains(n))
        .unwrap_or(2)
}

fn is_checked(el: &ElementData) -> bool {
    el.has_attr("checked") || aria_true(el, "aria-checked")
}

fn field_is_empty(doc: &Document, node: NodeId, el: &ElementData) -> bool {
    if el.tag == "textarea" {
        doc.tree().text_content(node).is_empty()
    } else {
        el.get_attr("value").unwrap_or("").is_empty()
    }
}

fn aria_true(el: &ElementData, name: &str) -> bool {
    el.get_attr(name).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn positive_int(el: &ElementData, name: &str) -> Option<i32> {
    el.get_attr(name)
        .and_then(|v| v.trim().parse::<i32>().ok())
        .filter(|v| *v > 0)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fos_dom::{DocumentId, DocumentKind, LayoutRect};

    fn doc() -> Document {
        Document::top_level(DocumentId(1), "https://example.com/")
    }

    fn get(doc: &Document, node: NodeId, key: CacheKey) -> Option<CacheValue> {
        compute_domain(doc, node, key.domain())
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    #[test]
    fn test_nested_list_group_info() {
        let mut doc = doc();
        let root = doc.root();
        let ul = doc.append_element(root, "ul", &[]).unwrap();
        let li1 = doc.append_element(ul, "li", &[]).unwrap();
        let inner = doc.append_element(li1, "ul", &[]).unwrap();
        let li1a = doc.append_element(inner, "li", &[]).unwrap();
        let li2 = doc.append_element(ul, "li", &[]).unwrap();
        let button = doc.append_element(root, "button", &[]).unwrap();

        let group = |n| compute_domain(&doc, n, CacheDomain::GROUP_INFO);
        assert_eq!(group(li1), vec![
            (CacheKey::PosInSet, CacheValue::Int(1)),
            (CacheKey::SetSize, CacheValue::Int(2)),
            (CacheKey::Level, CacheValue::Int(1)),
        ]);
        assert_eq!(group(li1a), vec![
            (CacheKey::PosInSet, CacheValue::Int(1)),
            (CacheKey::SetSize, CacheValue::Int(1)),
            (CacheKey::Level, CacheValue::Int(2)),
        ]);
        assert_eq!(group(li2), vec![
            (CacheKey::PosInSet, CacheValue::Int(2)),
            (CacheKey::SetSize, CacheValue::Int(2)),
            (CacheKey::Level, CacheValue::Int(1)),
        ]);
        assert!(group(button).is_empty());
    }

    #[test]
    fn test_aria_group_overrides() {
        let mut doc = doc();
        let root = doc.root();
        let ul = doc.append_element(root, "ul", &[]).unwrap();
        let li = doc.append_element(ul, "li", &[("aria-posinset", "5"), ("aria-setsize", "9")]).unwrap();
        assert_eq!(get(&doc, li, CacheKey::PosInSet), Some(CacheValue::Int(5)));
        assert_eq!(get(&doc, li, CacheKey::SetSize), Some(CacheValue::Int(9)));

        let h = doc.append_element(root, "h3", &[]).unwrap();
        assert_eq!(get(&doc, h, CacheKey::Level), Some(CacheValue::Int(3)));
    }

    #[test]
    fn test_language_inherits() {
        let mut doc = doc();
        let root = doc.root();
        let div = doc.append_element(root, "div", &[("lang", "fr")]).unwrap();
        let span = doc.append_element(div, "span", &[]).unwrap();
        assert_eq!(get(&doc, span, CacheKey::Language), Some(CacheValue::str("fr")));

        doc.remove_attribute(div, "lang").unwrap();
        assert_eq!(get(&doc, span, CacheKey::Language), None);
    }

    #[test]
    fn test_text_style_sorted_and_inherited() {
        let mut doc = doc();
        let root = doc.root();
        let div = doc.append_element(root, "div", &[]).unwrap();
        let span = doc.append_element(div, "span", &[]).unwrap();
        doc.set_style(div, "font-weight", "700").unwrap();
        doc.set_style(span, "color", "red").unwrap();
        doc.set_style(span, "display", "block").unwrap();

        assert_eq!(
            get(&doc, span, CacheKey::TextStyle),
            Some(CacheValue::str("color:red;font-weight:700;"))
        );
    }

    #[test]
    fn test_required_checkbox_invalid() {
        let mut doc = doc();
        let root = doc.root();
        let cb = doc.append_element(root, "input", &[("type", "checkbox")]).unwrap();
        assert_eq!(get(&doc, cb, CacheKey::Invalid), Some(CacheValue::Bool(false)));

        doc.toggle_attribute(cb, "required", true).unwrap();
        assert_eq!(get(&doc, cb, CacheKey::Required), Some(CacheValue::Bool(true)));
        assert_eq!(get(&doc, cb, CacheKey::Invalid), Some(CacheValue::Bool(true)));

        doc.toggle_attribute(cb, "checked", true).unwrap();
        assert_eq!(get(&doc, cb, CacheKey::Invalid), Some(CacheValue::Bool(false)));
        assert_eq!(get(&doc, cb, CacheKey::PrimaryAction), Some(CacheValue::Action(ActionKind::Uncheck)));
    }

    #[test]
    fn test_name_sources() {
        let mut doc = doc();
        let root = doc.root();
        let button = doc.append_element(root, "button", &[("title", "Hint")]).unwrap();
        doc.append_text(button, "  Save \n now ").unwrap();
        assert_eq!(get(&doc, button, CacheKey::Name), Some(CacheValue::str("Save now")));
        assert_eq!(get(&doc, button, CacheKey::Description), Some(CacheValue::str("Hint")));

        let img = doc.append_element(root, "img", &[("alt", "Logo"), ("aria-label", "Home")]).unwrap();
        assert_eq!(get(&doc, img, CacheKey::Name), Some(CacheValue::str("Home")));

        let div = doc.append_element(root, "div", &[("title", "Tip")]).unwrap();
        assert_eq!(get(&doc, div, CacheKey::Name), Some(CacheValue::str("Tip")));
        assert_eq!(get(&doc, div, CacheKey::Description), None);
    }

    #[test]
    fn test_apz_only_on_top_level_root() {
        let mut top = doc();
        top.pinch_zoom(2.0, 15, 30);
        let root = top.root();
        let div = top.append_element(root, "div", &[]).unwrap();
        assert_eq!(get(&top, root, CacheKey::VisualViewportOffset), Some(CacheValue::point(15, 30)));
        assert!(compute_domain(&top, div, CacheDomain::APZ).is_empty());

        let iframe = Document::new(DocumentId(2), DocumentKind::Iframe, "about:blank");
        assert!(compute_domain(&iframe, iframe.root(), CacheDomain::APZ).is_empty());
    }

    #[test]
    fn test_style_scroll_bounds_and_ids() {
        let mut doc = doc();
        let root = doc.root();
        let div = doc.append_element(root, "div", &[("id", "main"), ("class", "a b")]).unwrap();
        assert_eq!(get(&doc, div, CacheKey::Display), Some(CacheValue::str("block")));
        assert_eq!(get(&doc, div, CacheKey::ScrollPosition), None);
        assert_eq!(get(&doc, div, CacheKey::ClassName), Some(CacheValue::str("a b")));

        doc.scroll_to(div, 0, 120).unwrap();
        doc.set_layout(div, LayoutRect { x: 1, y: 2, width: 3, height: 4 }).unwrap();
        assert_eq!(get(&doc, div, CacheKey::ScrollPosition), Some(CacheValue::point(0, 120)));
        assert_eq!(
            get(&doc, div, CacheKey::Bounds),
            Some(CacheValue::Rect(CacheRect { x: 1, y: 2, width: 3, height: 4 }))
        );
    }

    #[test]
    fn test_removed_node_computes_nothing() {
        let mut doc = doc();
        let root = doc.root();
        let div = doc.append_element(root, "div", &[("id", "x")]).unwrap();
        doc.remove_node(div);
        assert!(compute_domain(&doc, div, CacheDomain::DOM_NODE_ID_AND_CLASS).is_empty());
    }
}
