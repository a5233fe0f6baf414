use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("pose needs at least 3 coordinates, got {0}")]
    ShortPose(usize),
    #[error("episode key `{0}` must have the form group/scene/trajectory/file")]
    MalformedKey(String),
    #[error("message is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}
