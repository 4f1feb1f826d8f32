//! Draw the robot from its witness description and hand in the image URL.
use serde::Deserialize;

use crate::errors::{PipelineError, PipelineResult};
use crate::headquarters::{Headquarters, ReportAck};
use crate::http::HttpClient;
use crate::pipeline::ResultExt;
use crate::providers::base::{GeneratedImage, ImageRequest, LlmClient};
use crate::telemetry::Tracer;

pub const TASK: &str = "robotid";
const IMAGE_SIZE: &str = "1024x1024";

#[derive(Debug, Deserialize)]
struct RobotDescription {
    description: String,
}

/// The described robot as a square image
pub fn image_request(model: &str, description: &str) -> ImageRequest {
    ImageRequest {
        model: model.to_string(),
        prompt: description.to_string(),
        size: Some(IMAGE_SIZE.to_string()),
    }
}

pub async fn solve(
    http: &HttpClient,
    llm: &dyn LlmClient,
    model: &str,
    headquarters: &Headquarters,
    tracer: &Tracer,
) -> PipelineResult<ReportAck> {
    let RobotDescription { description } =
        http.get_json(&headquarters.data_url("robotid.json")).await?;
    let image = tracer
        .with_trace("Generate Robot Image", |trace| {
            let request = image_request(model, &description);
            async move { llm.generate_image(&request, Some(&trace)).await }
        })
        .await
        .log_pipe("Generated image")?;
    let GeneratedImage { url, .. } = image;
    let url = url.ok_or_else(|| PipelineError::domain("No image URL in response"))?;
    headquarters.report(TASK, &url).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeadquartersSettings;
    use crate::providers::configs::OpenAiProviderConfig;
    use crate::providers::openai::OpenAiClient;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn headquarters(url: String) -> Headquarters {
        Headquarters::new(
            HttpClient::new().unwrap(),
            HeadquartersSettings {
                url,
                api_key: "key".to_string(),
            },
        )
    }

    async fn mount_description(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/data/key/robotid.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "description": "Mały robot na gąsienicach z jednym okiem"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_description_becomes_reported_image() {
        let server = MockServer::start().await;
        mount_description(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .and(body_json(json!({
                "model": "dall-e-3",
                "prompt": "Mały robot na gąsienicach z jednym okiem",
                "n": 1,
                "response_format": "url",
                "size": "1024x1024"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"url": "https://images.example/robot.png", "revised_prompt": "A small robot"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/report"))
            .and(body_json(json!({
                "task": "robotid",
                "apikey": "key",
                "answer": "https://images.example/robot.png"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0, "message": "OK"})))
            .expect(1)
            .mount(&server)
            .await;

        let llm = OpenAiClient::new(OpenAiProviderConfig::new(server.uri()).with_api_key("test"))
            .unwrap();
        let http = HttpClient::new().unwrap();
        let ack = solve(
            &http,
            &llm,
            "dall-e-3",
            &headquarters(server.uri()),
            &Tracer::disabled(),
        )
        .await
        .unwrap();
        assert_eq!(ack.message, "OK");
    }

    #[tokio::test]
    async fn test_image_without_url_is_not_reported() {
        let server = MockServer::start().await;
        mount_description(&server).await;
        Mock::given(method("POST"))
            .and(path("/report"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0, "message": "OK"})))
            .expect(0)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"b64_json": "iVBORw0KGgo=", "revised_prompt": "A small robot"}]
            })))
            .mount(&server)
            .await;

        let llm = OpenAiClient::new(OpenAiProviderConfig::new(server.uri()).with_api_key("test"))
            .unwrap();
        let err = solve(
            &HttpClient::new().unwrap(),
            &llm,
            "dall-e-3",
            &headquarters(server.uri()),
            &Tracer::disabled(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "No image URL in response");
    }
}
