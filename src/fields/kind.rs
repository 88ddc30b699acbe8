//! Field kinds keyed by the server's `inputtype` tag.

use serde::{Serialize, Serializer};

/// Semantic type of a field or column, from its `inputtype` tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    TextArea,
    Numeric,
    Toggle,
    Select,
    /// Status badge; the value maps to a label through `options`.
    Tag,
    MultiLanguage,
    MaskedDate,
    ObjectPreview,
    ActionTrigger,
    /// Any tag the console does not know yet. Rendered raw, never required.
    Unknown(String),
}

impl FieldKind {
    /// Total over every string: tags are trimmed, case-folded and `_` is
    /// read as `-`; anything unrecognised lands in [`FieldKind::Unknown`].
    pub fn from_tag(tag: &str) -> Self {
        let normalized = tag.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "" | "text" | "input" | "string" | "label" => FieldKind::Text,
            "textarea" | "text-area" | "multiline" | "richtext" => FieldKind::TextArea,
            "number" | "numeric" | "int" | "integer" | "decimal" | "float" | "amount" => {
                FieldKind::Numeric
            }
            "switch" | "toggle" | "checkbox" | "bool" | "boolean" => FieldKind::Toggle,
            "select" | "dropdown" | "radio" | "combobox" | "enum" => FieldKind::Select,
            "tag" | "status" | "badge" => FieldKind::Tag,
            "multilang" | "multi-lang" | "multi-language" | "multilanguage" | "i18n" => {
                FieldKind::MultiLanguage
            }
            "date" | "datetime" | "masked-date" | "maskdate" | "maskeddate" | "time" => {
                FieldKind::MaskedDate
            }
            "object" | "preview" | "object-preview" | "objectpreview" | "json" => {
                FieldKind::ObjectPreview
            }
            "button" | "action" | "action-trigger" | "link" | "operation" => {
                FieldKind::ActionTrigger
            }
            _ => FieldKind::Unknown(tag.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            FieldKind::Text => "text",
            FieldKind::TextArea => "textarea",
            FieldKind::Numeric => "numeric",
            FieldKind::Toggle => "toggle",
            FieldKind::Select => "select",
            FieldKind::Tag => "tag",
            FieldKind::MultiLanguage => "multi-language",
            FieldKind::MaskedDate => "masked-date",
            FieldKind::ObjectPreview => "object-preview",
            FieldKind::ActionTrigger => "action-trigger",
            FieldKind::Unknown(tag) => tag,
        }
    }

    /// Whether a `required` flag applies to this kind at all.
    pub fn can_be_required(&self) -> bool {
        !matches!(self, FieldKind::Unknown(_) | FieldKind::ActionTrigger)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, FieldKind::Unknown(_))
    }
}

impl Serialize for FieldKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tags() {
        assert_eq!(FieldKind::from_tag("numeric"), FieldKind::Numeric);
        assert_eq!(FieldKind::from_tag(" Switch "), FieldKind::Toggle);
        assert_eq!(FieldKind::from_tag("masked_date"), FieldKind::MaskedDate);
        assert_eq!(FieldKind::from_tag("STATUS"), FieldKind::Tag);
        assert_eq!(FieldKind::from_tag(""), FieldKind::Text);
    }

    #[test]
    fn test_unknown_tag_is_kept() {
        let kind = FieldKind::from_tag("hologram");
        assert_eq!(kind, FieldKind::Unknown("hologram".into()));
        assert_eq!(kind.tag(), "hologram");
        assert!(!kind.can_be_required());
    }
}
