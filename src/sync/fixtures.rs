//! Registry shared by the sync tests.

use crate::model::{FieldKind, RecordKind, Registry};

fn foreign_key(target: &str) -> FieldKind {
    FieldKind::ForeignKey {
        target: target.to_string(),
    }
}

/// Authors, books pointing at authors, and reviews pointing at a kind that
/// does not sync.
pub fn library() -> Registry {
    Registry::new(vec![
        RecordKind::new("Author")
            .with_field("name", FieldKind::Text)
            .with_field("born_on", FieldKind::Date)
            .with_field("portrait", FieldKind::Image),
        RecordKind::new("Book")
            .with_field("title", FieldKind::Text)
            .with_field("pages", FieldKind::Integer)
            .with_field("rating", FieldKind::Float)
            .with_field("in_print", FieldKind::Boolean)
            .with_field("tags", FieldKind::Json)
            .with_field("location", FieldKind::Json)
            .with_field("published_on", FieldKind::Date)
            .with_field("released_at", FieldKind::DateTime)
            .with_field("cover", FieldKind::Image)
            .with_field("author", foreign_key("Author"))
            .with_field(
                "editor",
                FieldKind::OneToOne {
                    target: "Author".to_string(),
                },
            ),
        RecordKind::new("Review")
            .with_field("body", FieldKind::Text)
            .with_field("publisher", foreign_key("Publisher")),
        RecordKind::new("Member")
            .with_class_name("_User")
            .with_field("username", FieldKind::Text),
    ])
    .unwrap()
}
