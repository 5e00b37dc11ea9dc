use serde_json::{Map, Value};

/// The shape of one page body, decided once per page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageBody {
    /// A bare JSON array.
    Sequence(Vec<Value>),
    /// An object whose `field` holds the page's items.
    Envelope { field: String, items: Vec<Value> },
    /// A lone value that is treated as a single item.
    Single(Value),
    /// `null` or an empty body.
    Empty,
}

/// `items_field` was given but the object has no array under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField(pub String);

impl PageBody {
    /// Classify a decoded page body.
    ///
    /// Without `items_field`, an object is unwrapped through its only
    /// array-valued field. Objects with no array field, or more than one, are
    /// kept whole as a single item.
    pub fn classify(body: Value, items_field: Option<&str>) -> Result<Self, MissingField> {
        match body {
            Value::Null => Ok(Self::Empty),
            Value::Array(items) => Ok(Self::Sequence(items)),
            Value::Object(mut object) => match items_field {
                Some(field) => match object.remove(field) {
                    Some(Value::Array(items)) => Ok(Self::Envelope {
                        field: field.to_string(),
                        items,
                    }),
                    _ => Err(MissingField(field.to_string())),
                },
                None => Ok(match sole_array_field(&object) {
                    Some(field) => {
                        let field = field.to_string();
                        match object.remove(&field) {
                            Some(Value::Array(items)) => Self::Envelope { field, items },
                            _ => Self::Single(Value::Object(object)),
                        }
                    },
                    None => Self::Single(Value::Object(object)),
                }),
            },
            scalar => Ok(Self::Single(scalar)),
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        match self {
            Self::Sequence(items) | Self::Envelope { items, .. } => items,
            Self::Single(item) => vec![item],
            Self::Empty => Vec::new(),
        }
    }
}

fn sole_array_field(object: &Map<String, Value>) -> Option<&str> {
    let mut arrays = object
        .iter()
        .filter(|(_, value)| value.is_array())
        .map(|(key, _)| key.as_str());
    match (arrays.next(), arrays.next()) {
        (Some(field), None) => Some(field),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, serde_json::json};

    #[rstest]
    #[case::bare_array(json!([{"id": 1}, {"id": 2}]), None, 2)]
    #[case::empty_array(json!([]), None, 0)]
    #[case::named_envelope(json!({"people": [{"id": 1}], "total": 1}), Some("people"), 1)]
    #[case::inferred_envelope(json!({"todos": [1, 2, 3], "meta": {"x": 1}}), None, 3)]
    #[case::no_array_field(json!({"id": 7, "name": "one"}), None, 1)]
    #[case::two_array_fields(json!({"a": [1], "b": [2, 3]}), None, 1)]
    #[case::null(Value::Null, None, 0)]
    #[case::scalar(json!("done"), None, 1)]
    fn counts_items(#[case] body: Value, #[case] field: Option<&str>, #[case] expected: usize) {
        let page = PageBody::classify(body, field).unwrap();
        assert_eq!(page.into_items().len(), expected);
    }

    #[test]
    fn inferred_envelope_reports_field() {
        let page = PageBody::classify(json!({"events": [{"id": 1}], "count": 1}), None).unwrap();
        assert_eq!(page, PageBody::Envelope {
            field: "events".into(),
            items: vec![json!({"id": 1})],
        });
    }

    #[test]
    fn ambiguous_object_is_kept_whole() {
        let body = json!({"a": [1], "b": [2]});
        assert_eq!(
            PageBody::classify(body.clone(), None).unwrap(),
            PageBody::Single(body)
        );
    }

    #[rstest]
    #[case::absent(json!({"other": []}))]
    #[case::not_an_array(json!({"items": {"id": 1}}))]
    fn named_field_must_be_an_array(#[case] body: Value) {
        assert_eq!(
            PageBody::classify(body, Some("items")).unwrap_err(),
            MissingField("items".into())
        );
    }

    #[test]
    fn named_field_is_ignored_for_arrays() {
        let page = PageBody::classify(json!([1, 2]), Some("items")).unwrap();
        assert_eq!(page, PageBody::Sequence(vec![json!(1), json!(2)]));
    }
}
