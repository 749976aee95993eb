use prost::Message;

/// Request for a quick match, sent by a client to the matchmaking frontend.
///
/// `password` carries the 32-byte salted hash, never the cleartext.
#[derive(Clone, PartialEq, Message)]
pub struct QuickMatchRequest {
    #[prost(string, tag = "1")]
    pub username: String,

    #[prost(bytes = "vec", tag = "2")]
    pub password: Vec<u8>,
}

/// Reply to a [`QuickMatchRequest`].
///
/// On success `server` is `host:port` of the match server and `auth_key` the
/// token to present there. `server == "FAIL"` denotes failure, with the
/// reason in `response`.
#[derive(Clone, PartialEq, Message)]
pub struct QuickMatchReply {
    #[prost(string, tag = "1")]
    pub username: String,

    #[prost(string, tag = "2")]
    pub server: String,

    #[prost(string, tag = "3")]
    pub auth_key: String,

    #[prost(double, tag = "4")]
    pub ranking: f64,

    #[prost(string, tag = "5")]
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let request = QuickMatchRequest {
            username: "alice".into(),
            password: vec![7; 32],
        };
        let decoded = QuickMatchRequest::decode(request.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn reply_round_trips() {
        let reply = QuickMatchReply {
            username: "alice".into(),
            server: "localhost:21450".into(),
            auth_key: "ab".repeat(32),
            ranking: 1000.0,
            response: String::new(),
        };
        let decoded = QuickMatchReply::decode(reply.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, reply);
    }
}
