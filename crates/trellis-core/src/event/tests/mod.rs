
#[cfg(test)]
mod tests {
    use crate::event::{Event, EventResult};

    #[test]
    fn test_event_accessors() {
        let event = Event::new("orders:created", Some(serde_json::json!({ "id": 7 })));
        assert_eq!(event.topic(), "orders:created");
        assert_eq!(event.payload(), Some(&serde_json::json!({ "id": 7 })));
        assert_eq!(Event::new("application:run", None).payload(), None);
    }

    #[test]
    fn test_event_result_variants_differ() {
        assert_ne!(EventResult::Continue, EventResult::Stop);
    }
}
