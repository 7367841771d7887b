use crate::error::HuggingFaceError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageToTextOutput {
    pub generated_text: String,
}

/// Captioning models answer with a list, but some deployments return a
/// bare object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ImageToTextResponse {
    Many(Vec<ImageToTextOutput>),
    One(ImageToTextOutput),
}

pub fn parse_image_to_text(raw: &str, model: &str) -> Result<String, HuggingFaceError> {
    let response: ImageToTextResponse = serde_json::from_str(raw)?;
    let first = match response {
        ImageToTextResponse::Many(outputs) => outputs.into_iter().next(),
        ImageToTextResponse::One(output) => Some(output),
    };
    first
        .map(|output| output.generated_text)
        .ok_or_else(|| HuggingFaceError::EmptyResponse(model.to_string()))
}

/// One detection from an object-detection model such as DETR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub score: f64,
    pub label: String,
    #[serde(rename = "box")]
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: i64,
    pub ymin: i64,
    pub xmax: i64,
    pub ymax: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_output() {
        let raw = r#"[{"generated_text": "a herd of zebras"}, {"generated_text": "ignored"}]"#;
        assert_eq!(parse_image_to_text(raw, "m").unwrap(), "a herd of zebras");
    }

    #[test]
    fn parses_single_object_output() {
        let raw = r#"{"generated_text": "a lion"}"#;
        assert_eq!(parse_image_to_text(raw, "m").unwrap(), "a lion");
    }

    #[test]
    fn empty_list_is_an_error() {
        assert!(matches!(
            parse_image_to_text("[]", "blip"),
            Err(HuggingFaceError::EmptyResponse(model)) if model == "blip"
        ));
    }

    #[test]
    fn detection_output_deserializes() {
        let raw = r#"[{"score":0.99,"label":"zebra","box":{"xmin":1,"ymin":2,"xmax":30,"ymax":40}}]"#;
        let objects: Vec<DetectedObject> = serde_json::from_str(raw).unwrap();
        assert_eq!(objects[0].label, "zebra");
        assert_eq!(objects[0].bounding_box.xmax, 30);
    }
}
