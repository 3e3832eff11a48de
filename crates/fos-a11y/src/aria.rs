//! ARIA Roles
//!
//! Explicit `role` attributes and the implicit roles of HTML elements.
//! Attribute computation branches on these.

use fos_dom::ElementData;

/// ARIA role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AriaRole {
    // Widget roles
    Button,
    Checkbox,
    Link,
    MenuItem,
    Option,
    Radio,
    Slider,
    SpinButton,
    Switch,
    Tab,
    TextBox,
    ComboBox,
    TreeItem,

    // Document structure
    Article,
    Group,
    Heading,
    Img,
    List,
    ListItem,
    Tree,
    Summary,
    Presentation,

    /// No specific semantics
    Generic,
}

impl AriaRole {
    /// Parse from a `role` attribute (first recognised token wins)
    pub fn parse(s: &str) -> Option<Self> {
        s.split_ascii_whitespace().find_map(|token| {
            Some(match token.to_ascii_lowercase().as_str() {
                "button" => Self::Button,
                "checkbox" => Self::Checkbox,
                "link" => Self::Link,
                "menuitem" => Self::MenuItem,
                "option" => Self::Option,
                "radio" => Self::Radio,
                "slider" => Self::Slider,
                "spinbutton" => Self::SpinButton,
                "switch" => Self::Switch,
                "tab" => Self::Tab,
                "textbox" | "searchbox" => Self::TextBox,
                "combobox" => Self::ComboBox,
                "treeitem" => Self::TreeItem,
                "article" => Self::Article,
                "group" => Self::Group,
                "heading" => Self::Heading,
                "img" | "image" => Self::Img,
                "list" => Self::List,
                "listitem" => Self::ListItem,
                "tree" => Self::Tree,
                "none" | "presentation" => Self::Presentation,
                "generic" => Self::Generic,
                _ => return None,
            })
        })
    }

    /// Role of an element: explicit `role`, else implied by the tag
    pub fn of(el: &ElementData) -> Self {
        el.get_attr("role")
            .and_then(Self::parse)
            .unwrap_or_else(|| Self::implicit(el))
    }

    /// Role implied by the tag and its attributes
    pub fn implicit(el: &ElementData) -> Self {
        match el.tag.as_str() {
            "button" => Self::Button,
            "a" | "area" if el.has_attr("href") => Self::Link,
            "input" => match input_type(el) {
                "checkbox" => Self::Checkbox,
                "radio" => Self::Radio,
                "range" => Self::Slider,
                "number" => Self::SpinButton,
                "button" | "submit" | "reset" | "image" => Self::Button,
                "hidden" => Self::Presentation,
                _ => Self::TextBox,
            },
            "textarea" => Self::TextBox,
            "select" => Self::ComboBox,
            "option" => Self::Option,
            "ul" | "ol" | "menu" => Self::List,
            "li" => Self::ListItem,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Self::Heading,
            "img" if el.get_attr("alt") == Some("") => Self::Presentation,
            "img" => Self::Img,
            "article" => Self::Article,
            "details" | "fieldset" => Self::Group,
            "summary" => Self::Summary,
            _ => Self::Generic,
        }
    }

    /// Check if role is widget
    pub fn is_widget(&self) -> bool {
        matches!(
            self,
            Self::Button
                | Self::Checkbox
                | Self::Link
                | Self::MenuItem
                | Self::Option
                | Self::Radio
                | Self::Slider
                | Self::SpinButton
                | Self::Switch
                | Self::Tab
                | Self::TextBox
                | Self::ComboBox
                | Self::TreeItem
        )
    }

    /// Roles whose name comes from their subtree text
    pub fn name_from_content(&self) -> bool {
        matches!(
            self,
            Self::Button
                | Self::Checkbox
                | Self::Link
                | Self::MenuItem
                | Self::Option
                | Self::Radio
                | Self::Switch
                | Self::Tab
                | Self::TreeItem
                | Self::Heading
                | Self::ListItem
                | Self::Summary
        )
    }

    /// Containers that give their items a position in set
    pub fn is_set_container(&self) -> bool {
        matches!(self, Self::List | Self::Tree)
    }

    /// Items that get a position in set
    pub fn is_set_item(&self) -> bool {
        matches!(self, Self::ListItem | Self::TreeItem)
    }

    /// Roles that can be checked
    pub fn is_checkable(&self) -> bool {
        matches!(self, Self::Checkbox | Self::Radio | Self::Switch)
    }

    /// Text entry controls
    pub fn is_text_control(&self) -> bool {
        matches!(self, Self::TextBox | Self::SpinButton)
    }
}

/// `type` of an input, defaulting to `text`
fn input_type(el: &ElementData) -> &str {
    match el.get_attr("type") {
        Some(t) if !t.is_empty() => t,
        _ => "text",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(tag: &str, attrs: &[(&str, &str)]) -> ElementData {
        let mut el = ElementData::new(tag);
        for (name, value) in attrs {
            el.set_attr(name, value);
        }
        el
    }

    #[test]
    fn test_parse_role() {
        assert_eq!(AriaRole::parse("button"), Some(AriaRole::Button));
        assert_eq!(AriaRole::parse("bogus listitem"), Some(AriaRole::ListItem));
        assert_eq!(AriaRole::parse("bogus"), None);
        assert!(AriaRole::Button.is_widget());
    }

    #[test]
    fn test_implicit_roles() {
        assert_eq!(AriaRole::of(&el("li", &[])), AriaRole::ListItem);
        assert_eq!(AriaRole::of(&el("a", &[])), AriaRole::Generic);
        assert_eq!(AriaRole::of(&el("a", &[("href", "#")])), AriaRole::Link);
        assert_eq!(AriaRole::of(&el("input", &[("type", "checkbox")])), AriaRole::Checkbox);
        assert_eq!(AriaRole::of(&el("input", &[])), AriaRole::TextBox);
        assert_eq!(AriaRole::of(&el("h3", &[])), AriaRole::Heading);
    }

    #[test]
    fn test_explicit_role_wins() {
        assert_eq!(AriaRole::of(&el("div", &[("role", "checkbox")])), AriaRole::Checkbox);
        // Unknown role falls back to the tag
        assert_eq!(AriaRole::of(&el("li", &[("role", "bogus")])), AriaRole::ListItem);
    }
}
