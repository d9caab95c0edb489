//! Read-path predicate construction.
//!
//! Translates a selector into a sea-query SELECT over `sys_event_store`.
//! Kept free of any connection so the generated SQL can be inspected
//! directly.

use sea_query::{Cond, Condition, Expr, LikeExpr, Order, Query, SelectStatement, SimpleExpr};

use crate::events::EventTypes;
use crate::selector::{comparable_part, has_wildcard, Selector};
use crate::storage::record::CATEGORY_SEPARATOR;
use crate::storage::schema::{SysEventStore, RECORD_COLUMNS};

/// Escape character declared on every LIKE predicate.
pub const LIKE_ESCAPE: char = '!';

/// Escape LIKE metacharacters so `literal` only matches itself.
pub fn escape_like(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

fn like(pattern: String) -> LikeExpr {
    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}

/// Equality on a literal stream name, prefix match on a wildcarded one.
pub fn stream_predicate(stream_name: &str) -> SimpleExpr {
    let comparable = comparable_part(stream_name);
    if has_wildcard(stream_name) {
        Expr::col(SysEventStore::EventStream).like(like(format!("{}%", escape_like(comparable))))
    } else {
        Expr::col(SysEventStore::EventStream).eq(comparable)
    }
}

/// Match any of `categories` inside the packed comma-joined column.
///
/// Each category is an OR of exact, leading, trailing and infix matches.
/// Returns `None` for an empty list.
pub fn categories_predicate(categories: &[String]) -> Option<Condition> {
    if categories.is_empty() {
        return None;
    }

    let sep = CATEGORY_SEPARATOR;
    let condition = categories.iter().fold(Cond::any(), |any, category| {
        let escaped = escape_like(category);
        any.add(
            Cond::any()
                .add(Expr::col(SysEventStore::EventCategories).eq(category.as_str()))
                .add(Expr::col(SysEventStore::EventCategories).like(like(format!("{escaped}{sep}%"))))
                .add(Expr::col(SysEventStore::EventCategories).like(like(format!("%{sep}{escaped}"))))
                .add(
                    Expr::col(SysEventStore::EventCategories)
                        .like(like(format!("%{sep}{escaped}{sep}%"))),
                ),
        )
    });
    Some(condition)
}

/// Restrict to the given event types and every registered subtype.
pub fn events_predicate(events: &[String], types: &EventTypes) -> Option<SimpleExpr> {
    if events.is_empty() {
        return None;
    }

    let mut names: Vec<String> = Vec::new();
    for event in events {
        for name in types.with_descendants(event) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    Some(Expr::col(SysEventStore::EventName).is_in(names))
}

/// Full selection condition for a non-`all` selector.
pub fn selection_condition(selector: &Selector, types: &EventTypes) -> Condition {
    let stream = (!selector.stream_name().is_empty())
        .then(|| stream_predicate(selector.stream_name()));

    Cond::all()
        .add_option(stream)
        .add_option(categories_predicate(selector.categories()))
        .add_option(events_predicate(selector.events(), types))
}

/// SELECT of every record admitted by `selector`, in insertion order.
pub fn build_stream_query(selector: &Selector, types: &EventTypes) -> SelectStatement {
    let mut query = Query::select();
    query.columns(RECORD_COLUMNS).from(SysEventStore::Table);
    if !selector.is_all() {
        query.cond_where(selection_condition(selector, types));
    }
    query.order_by(SysEventStore::Id, Order::Asc);
    query
}
