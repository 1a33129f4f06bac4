//! Offset/limit handling per upstream function.
//!
//! Some Moodle functions accept native paging parameters, most do not and
//! reject unknown keys. The registry records the former; everything else is
//! fetched whole and sliced locally.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// How a function pages its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationSpec {
    NativeOffset {
        limit_param: &'static str,
        offset_param: &'static str,
    },
    NativePage {
        page_param: &'static str,
        per_page_param: &'static str,
    },
    ClientSide,
}

/// Functions known to accept native paging parameters.
const NATIVE_PAGINATION: &[(&str, PaginationSpec)] = &[
    (
        "core_message_get_conversations",
        PaginationSpec::NativeOffset {
            limit_param: "limitnum",
            offset_param: "limitfrom",
        },
    ),
    (
        "core_message_get_conversation_messages",
        PaginationSpec::NativeOffset {
            limit_param: "limitnum",
            offset_param: "limitfrom",
        },
    ),
    (
        "core_message_get_messages",
        PaginationSpec::NativeOffset {
            limit_param: "limitnum",
            offset_param: "limitfrom",
        },
    ),
    (
        "core_badges_get_user_badges",
        PaginationSpec::NativePage {
            page_param: "page",
            per_page_param: "perpage",
        },
    ),
    (
        "mod_forum_get_forum_discussions",
        PaginationSpec::NativePage {
            page_param: "page",
            per_page_param: "perpage",
        },
    ),
    (
        "core_course_search_courses",
        PaginationSpec::NativePage {
            page_param: "page",
            per_page_param: "perpage",
        },
    ),
];

/// Half-open `[start, end)` window applied to a collection after the fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceRange {
    pub start: usize,
    pub end: usize,
}

impl SliceRange {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            start: offset,
            end: offset.saturating_add(limit),
        }
    }

    /// Items in `[start, end)`, clamped to the collection length.
    pub fn apply<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let start = self.start.min(items.len());
        let end = self.end.min(items.len());
        items[start..end].to_vec()
    }
}

/// Parameters to send plus an optional local window.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPage {
    pub parameters: Map<String, Value>,
    pub local_slice: Option<SliceRange>,
}

/// Static function → pagination mapping, fixed after startup.
#[derive(Debug, Clone, Default)]
pub struct PaginationRegistry {
    specs: HashMap<&'static str, PaginationSpec>,
}

impl PaginationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the functions known to page natively.
    pub fn moodle_defaults() -> Self {
        NATIVE_PAGINATION
            .iter()
            .fold(Self::new(), |registry, &(name, spec)| registry.with(name, spec))
    }

    pub fn with(mut self, function_name: &'static str, spec: PaginationSpec) -> Self {
        self.specs.insert(function_name, spec);
        self
    }

    /// Unregistered functions are client-side: never guess native params.
    pub fn spec_for(&self, function_name: &str) -> PaginationSpec {
        self.specs
            .get(function_name)
            .copied()
            .unwrap_or(PaginationSpec::ClientSide)
    }

    pub fn prepare(
        &self,
        function_name: &str,
        mut parameters: Map<String, Value>,
        offset: usize,
        limit: usize,
    ) -> PreparedPage {
        let window = SliceRange::new(offset, limit);

        // A zero limit means "everything" to Moodle, so it is never forwarded.
        if limit == 0 {
            return PreparedPage {
                parameters,
                local_slice: Some(window),
            };
        }

        let local_slice = match self.spec_for(function_name) {
            PaginationSpec::NativeOffset {
                limit_param,
                offset_param,
            } => {
                parameters.insert(offset_param.to_string(), Value::from(offset));
                parameters.insert(limit_param.to_string(), Value::from(limit));
                None
            }
            PaginationSpec::NativePage {
                page_param,
                per_page_param,
            } => {
                if offset % limit == 0 {
                    parameters.insert(page_param.to_string(), Value::from(offset / limit));
                    parameters.insert(per_page_param.to_string(), Value::from(limit));
                    None
                } else {
                    // Unaligned window: fetch the first page large enough to
                    // cover it and cut locally.
                    parameters.insert(page_param.to_string(), Value::from(0));
                    parameters.insert(per_page_param.to_string(), Value::from(window.end));
                    Some(window)
                }
            }
            PaginationSpec::ClientSide => Some(window),
        };

        PreparedPage {
            parameters,
            local_slice,
        }
    }
}

/// Slice the collection inside `payload` to `range`.
///
/// The collection is the payload itself when it is an array, the array under
/// `collection_key` when given, or the only array-valued field of an object.
/// Payloads with no identifiable collection are returned unchanged.
pub fn apply_slice(payload: Value, range: SliceRange, collection_key: Option<&str>) -> Value {
    match payload {
        Value::Array(items) => Value::Array(range.apply(&items)),
        Value::Object(mut map) => {
            let key = match collection_key {
                Some(key) => Some(key.to_string()),
                None => sole_array_field(&map),
            };
            if let Some(key) = key {
                if let Some(Value::Array(items)) = map.get(&key) {
                    let sliced = range.apply(items);
                    map.insert(key, Value::Array(sliced));
                }
            }
            Value::Object(map)
        }
        other => other,
    }
}

fn sole_array_field(map: &Map<String, Value>) -> Option<String> {
    let mut arrays = map.iter().filter(|(_, v)| v.is_array());
    match (arrays.next(), arrays.next()) {
        (Some((key, _)), None) => Some(key.clone()),
        _ => None,
    }
}
