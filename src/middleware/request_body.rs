//! Payload encoder stage.
//!
//! Turns structured bodies into bytes once per logical request, before the
//! retry stage, so every attempt sends the same encoded snapshot.

use std::sync::Arc;

use crate::{
    error::MetricsError,
    transport::{Body, Middleware, Next, Request, Response},
};

/// MIME type sent with JSON payloads.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Wire form of a [`Body`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Arc<[u8]>,
    /// Content type implied by the body, if any.
    pub content_type: Option<&'static str>,
}

/// Encode a body to bytes.
///
/// Raw bytes pass through without copying. JSON values serialise the same way
/// every time, so equal values produce identical output.
pub fn encode(body: &Body) -> Result<Encoded, MetricsError> {
    match body {
        Body::Empty => Ok(Encoded {
            bytes: Arc::from(Vec::new()),
            content_type: None,
        }),
        Body::Bytes(bytes) => Ok(Encoded {
            bytes: Arc::clone(bytes),
            content_type: None,
        }),
        Body::Json(value) => Ok(Encoded {
            bytes: Arc::from(serde_json::to_vec(value)?),
            content_type: Some(JSON_CONTENT_TYPE),
        }),
    }
}

/// Middleware that replaces JSON bodies with their encoded bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestBody;

impl Middleware for RequestBody {
    fn name(&self) -> &'static str {
        "request_body"
    }

    fn handle(&self, mut request: Request, next: Next<'_>) -> Result<Response, MetricsError> {
        if matches!(request.body, Body::Json(_)) {
            let encoded = encode(&request.body)?;
            if let Some(content_type) = encoded.content_type {
                request.headers.set("Content-Type", content_type);
            }
            request.body = Body::Bytes(encoded.bytes);
        }
        next.run(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::MetricsBatch;
    use crate::transport::{HTTPMethod, HttpBackend, Pipeline};
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Capture {
        seen: Mutex<Vec<Request>>,
    }

    impl HttpBackend for Capture {
        fn send(&self, request: &Request) -> Result<Response, MetricsError> {
            self.seen.lock().push(request.clone());
            Ok(Response::with_status(200))
        }
    }

    #[test]
    fn json_is_encoded_once_before_the_backend() {
        let backend = Capture::default();
        let pipeline = Pipeline::new().with(RequestBody);
        let body = Body::Json(json!({"gauges": [{"name": "foo", "value": 1.5}]}));
        let request = Request::new(HTTPMethod::POST, "http://x/v1/metrics")
            .with_header("Content-Type", "text/plain")
            .with_body(body);
        pipeline.run(&backend, request).expect("response");

        let seen = backend.seen.lock();
        assert_eq!(seen[0].headers.get("content-type"), Some(JSON_CONTENT_TYPE));
        assert_eq!(
            seen[0].body,
            Body::bytes(br#"{"gauges":[{"name":"foo","value":1.5}]}"#.to_vec())
        );
    }

    #[test]
    fn raw_bytes_are_shared_not_copied() {
        let body = Body::bytes(b"abc".to_vec());
        let encoded = encode(&body).expect("encode");
        match body {
            Body::Bytes(original) => assert!(Arc::ptr_eq(&original, &encoded.bytes)),
            _ => unreachable!(),
        }
        assert_eq!(encoded.content_type, None);
    }

    #[test]
    fn empty_body_encodes_to_nothing() {
        let encoded = encode(&Body::Empty).expect("encode");
        assert!(encoded.bytes.is_empty());
    }

    #[test]
    fn json_batches_keep_field_order() {
        let batch = MetricsBatch::new().with_gauge("foo", 1).with_counter("hits", 2);
        let encoded = encode(&Body::json(&batch).expect("json")).expect("encode");
        assert_eq!(
            &encoded.bytes[..],
            &serde_json::to_vec(&batch).expect("serialise")[..]
        );
        assert!(encoded.bytes.starts_with(br#"{"gauges":"#));
    }

    #[test]
    fn equal_values_encode_identically() {
        let value = json!({"counters": [{"name": "a", "value": 1.0}], "gauges": []});
        let first = encode(&Body::Json(value.clone())).expect("encode");
        let second = encode(&Body::Json(value)).expect("encode");
        assert_eq!(first, second);
    }
}
