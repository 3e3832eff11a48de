//! Cached values

use fos_ipc::{ByteReader, IpcError, IpcSerialize, write_string, write_varint_signed};

/// Primary action of an accessible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActionKind {
    Click = 0,
    Press = 1,
    Check = 2,
    Uncheck = 3,
    Select = 4,
    Jump = 5,
    Expand = 6,
    Collapse = 7,
}

impl ActionKind {
    const ALL: [ActionKind; 8] = [
        Self::Click,
        Self::Press,
        Self::Check,
        Self::Uncheck,
        Self::Select,
        Self::Jump,
        Self::Expand,
        Self::Collapse,
    ];

    /// Native action name
    pub fn name(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Press => "press",
            Self::Check => "check",
            Self::Uncheck => "uncheck",
            Self::Select => "select",
            Self::Jump => "jump",
            Self::Expand => "expand",
            Self::Collapse => "collapse",
        }
    }

    fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.get(v as usize).copied()
    }
}

/// Point in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CachePoint {
    pub x: i32,
    pub y: i32,
}

/// Rectangle in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Typed cache value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    Str(String),
    Int(i32),
    Bool(bool),
    Action(ActionKind),
    Point(CachePoint),
    Rect(CacheRect),
}

impl CacheValue {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    pub fn point(x: i32, y: i32) -> Self {
        Self::Point(CachePoint { x, y })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String form handed to native bridges (ATK attribute sets, AX values)
    pub fn to_attribute_string(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Action(a) => a.name().to_string(),
            Self::Point(p) => format!("{},{}", p.x, p.y),
            Self::Rect(r) => format!("{},{},{},{}", r.x, r.y, r.width, r.height),
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::Str(_) => 0,
            Self::Int(_) => 1,
            Self::Bool(_) => 2,
            Self::Action(_) => 3,
            Self::Point(_) => 4,
            Self::Rect(_) => 5,
        }
    }
}

fn read_i32(reader: &mut ByteReader<'_>) -> Result<i32, IpcError> {
    i32::try_from(reader.read_varint_signed()?).map_err(|_| IpcError::InvalidFormat)
}

impl IpcSerialize for CacheValue {
    fn ipc_serialize(&self, buf: &mut Vec<u8>) {
        buf.push(self.tag());
        match self {
            Self::Str(s) => write_string(buf, s),
            Self::Int(i) => write_varint_signed(buf, *i as i64),
            Self::Bool(b) => buf.push(*b as u8),
            Self::Action(a) => buf.push(*a as u8),
            Self::Point(p) => {
                write_varint_signed(buf, p.x as i64);
                write_varint_signed(buf, p.y as i64);
            }
            Self::Rect(r) => {
                for v in [r.x, r.y, r.width, r.height] {
                    write_varint_signed(buf, v as i64);
                }
            }
        }
    }

    fn ipc_deserialize(reader: &mut ByteReader<'_>) -> Result<Self, IpcError> {
        Ok(match reader.read_u8()? {
            0 => Self::Str(reader.read_string()?.to_string()),
            1 => Self::Int(read_i32(reader)?),
            2 => match reader.read_u8()? {
                0 => Self::Bool(false),
                1 => Self::Bool(true),
                _ => return Err(IpcError::InvalidFormat),
            },
            3 => Self::Action(ActionKind::from_u8(reader.read_u8()?).ok_or(IpcError::InvalidFormat)?),
            4 => Self::Point(CachePoint { x: read_i32(reader)?, y: read_i32(reader)? }),
            5 => Self::Rect(CacheRect {
                x: read_i32(reader)?,
                y: read_i32(reader)?,
                width: read_i32(reader)?,
                height: read_i32(reader)?,
            }),
            _ => return Err(IpcError::InvalidFormat),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_strings() {
        assert_eq!(CacheValue::Int(2).to_attribute_string(), "2");
        assert_eq!(CacheValue::Action(ActionKind::Uncheck).to_attribute_string(), "uncheck");
        assert_eq!(CacheValue::point(-3, 40).to_attribute_string(), "-3,40");
        assert_eq!(CacheValue::Int(2).as_int(), Some(2));
        assert_eq!(CacheValue::Bool(true).as_int(), None);
    }

    #[test]
    fn test_negative_point_wire() {
        let value = CacheValue::point(-120, i32::MAX);
        let decoded = CacheValue::from_ipc_bytes(&value.to_ipc_bytes()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_bad_tags_rejected() {
        assert_eq!(CacheValue::from_ipc_bytes(&[9]), Err(IpcError::InvalidFormat));
        assert_eq!(CacheValue::from_ipc_bytes(&[2, 7]), Err(IpcError::InvalidFormat));
        assert_eq!(CacheValue::from_ipc_bytes(&[3, 42]), Err(IpcError::InvalidFormat));
    }
}
