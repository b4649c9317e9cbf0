/// Input for one search invocation.
///
/// A caller that already holds an embedding supplies it directly and the
/// provider round-trip is skipped. Text that is blank after trimming is
/// rejected before anything goes on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    Text(String),
    Vector(Vec<f32>),
}

impl From<&str> for QueryInput {
    fn from(text: &str) -> Self {
        QueryInput::Text(text.to_string())
    }
}

impl From<String> for QueryInput {
    fn from(text: String) -> Self {
        QueryInput::Text(text)
    }
}

impl From<Vec<f32>> for QueryInput {
    fn from(vector: Vec<f32>) -> Self {
        QueryInput::Vector(vector)
    }
}
