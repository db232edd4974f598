//! Postgres-backed [`RoomStore`].
//!
//! DESIGN
//! ======
//! Elements live in one `elements` table: a `BIGSERIAL seq` fixes insertion
//! order, shape fields are flattened into nullable columns, and stroke points
//! are stored as JSONB. `(room_id, id)` is unique and inserts use
//! `ON CONFLICT DO NOTHING`, so a batch retried after a partial failure
//! never duplicates an element.
//!
//! ERROR HANDLING
//! ==============
//! SQL failures map to `PersistenceError::Database`. A row that cannot be
//! turned back into an element (unknown kind, missing columns) fails the
//! whole read with `PersistenceError::Corrupt` rather than silently dropping
//! part of the room.

use async_trait::async_trait;
use frames::{ChatMessage, Element, ElementKind, Point, Shape};
use serde_json::Value;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use super::store::{PersistenceError, RoomStore};

// =============================================================================
// ROW MAPPING
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ElementRow {
    id: Uuid,
    kind: String,
    points: Option<Value>,
    origin_x: Option<f64>,
    origin_y: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
    text: Option<String>,
    font_size: Option<f64>,
    color: String,
    fill_color: Option<String>,
    stroke_width: f64,
    author: Option<String>,
}

/// Column values for one element insert.
struct ElementColumns<'a> {
    points: Option<Value>,
    origin: Option<Point>,
    width: Option<f64>,
    height: Option<f64>,
    text: Option<&'a str>,
    font_size: Option<f64>,
}

fn columns(element: &Element) -> ElementColumns<'_> {
    let mut cols =
        ElementColumns { points: None, origin: element.origin(), width: None, height: None, text: None, font_size: None };
    match &element.shape {
        Shape::Path { points } | Shape::Eraser { points } => {
            cols.points = Some(serde_json::to_value(points).unwrap_or(Value::Null));
        }
        Shape::Rect { width, height, .. } | Shape::Circle { width, height, .. } => {
            cols.width = Some(*width);
            cols.height = Some(*height);
        }
        Shape::Text { text, font_size, .. } => {
            cols.text = Some(text.as_str());
            cols.font_size = Some(*font_size);
        }
    }
    cols
}

impl TryFrom<ElementRow> for Element {
    type Error = PersistenceError;

    fn try_from(row: ElementRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| PersistenceError::Corrupt(format!("element {}: {what}", row.id));
        let kind = ElementKind::parse(&row.kind).ok_or_else(|| corrupt("unknown kind"))?;

        let origin = match (row.origin_x, row.origin_y) {
            (Some(x), Some(y)) => Some(Point::new(x, y)),
            _ => None,
        };
        let points = || -> Result<Vec<Point>, PersistenceError> {
            let value = row.points.clone().ok_or_else(|| corrupt("missing points"))?;
            serde_json::from_value(value).map_err(|e| corrupt(&e.to_string()))
        };

        let shape = match kind {
            ElementKind::Path => Shape::Path { points: points()? },
            ElementKind::Eraser => Shape::Eraser { points: points()? },
            ElementKind::Rect | ElementKind::Circle => {
                let origin = origin.ok_or_else(|| corrupt("missing origin"))?;
                let width = row.width.ok_or_else(|| corrupt("missing width"))?;
                let height = row.height.ok_or_else(|| corrupt("missing height"))?;
                let fill_color = row.fill_color.clone();
                if kind == ElementKind::Rect {
                    Shape::Rect { origin, width, height, fill_color }
                } else {
                    Shape::Circle { origin, width, height, fill_color }
                }
            }
            ElementKind::Text => Shape::Text {
                origin: origin.ok_or_else(|| corrupt("missing origin"))?,
                text: row.text.clone().ok_or_else(|| corrupt("missing text"))?,
                font_size: row.font_size.unwrap_or(frames::element::DEFAULT_FONT_SIZE),
            },
        };

        Ok(Element { id: row.id, color: row.color, stroke_width: row.stroke_width, author: row.author, shape })
    }
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Clone)]
pub struct PgRoomStore {
    pool: PgPool,
}

impl PgRoomStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomStore for PgRoomStore {
    async fn append_element(&self, room_id: &str, element: &Element) -> Result<(), PersistenceError> {
        self.append_elements(room_id, std::slice::from_ref(element)).await
    }

    async fn append_elements(&self, room_id: &str, elements: &[Element]) -> Result<(), PersistenceError> {
        if elements.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<sqlx::Postgres>::new(
            "INSERT INTO elements (room_id, id, kind, points, origin_x, origin_y, width, height, \
             text, font_size, color, fill_color, stroke_width, author) ",
        );
        builder.push_values(elements, |mut row, element| {
            let cols = columns(element);
            row.push_bind(room_id)
                .push_bind(element.id)
                .push_bind(element.kind().as_str())
                .push_bind(cols.points)
                .push_bind(cols.origin.map(|p| p.x))
                .push_bind(cols.origin.map(|p| p.y))
                .push_bind(cols.width)
                .push_bind(cols.height)
                .push_bind(cols.text.map(str::to_owned))
                .push_bind(cols.font_size)
                .push_bind(element.color.clone())
                .push_bind(element.fill_color().map(str::to_owned))
                .push_bind(element.stroke_width)
                .push_bind(element.author.clone());
        });
        builder.push(" ON CONFLICT (room_id, id) DO NOTHING");

        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn list_elements(&self, room_id: &str) -> Result<Vec<Element>, PersistenceError> {
        let rows = sqlx::query_as::<_, ElementRow>(
            "SELECT id, kind, points, origin_x, origin_y, width, height, text, font_size, \
             color, fill_color, stroke_width, author \
             FROM elements WHERE room_id = $1 ORDER BY seq ASC",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Element::try_from).collect()
    }

    async fn clear_all(&self, room_id: &str) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM elements WHERE room_id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn append_message(&self, message: &ChatMessage) -> Result<(), PersistenceError> {
        sqlx::query("INSERT INTO messages (room_id, sender_id, content, created_at) VALUES ($1, $2, $3, $4)")
            .bind(&message.room_id)
            .bind(&message.sender_id)
            .bind(&message.content)
            .bind(message.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_messages(&self, room_id: &str, limit: usize) -> Result<Vec<ChatMessage>, PersistenceError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, (String, String, String, i64)>(
            "SELECT room_id, sender_id, content, created_at \
             FROM messages WHERE room_id = $1 \
             ORDER BY created_at ASC, seq ASC LIMIT $2",
        )
        .bind(room_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(room_id, sender_id, content, created_at)| ChatMessage { room_id, sender_id, content, created_at })
            .collect())
    }
}

#[cfg(test)]
#[path = "pg_store_test.rs"]
mod tests;
