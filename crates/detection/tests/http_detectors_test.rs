use serde_json::json;
use sketchform_detection::{
    AzureReadConfig, AzureReadDetector, DetectionError, HttpObjectDetector,
    HttpObjectDetectorConfig, ObjectDetector, TextDetector,
};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IMAGE_URL: &str = "https://uploads.example.com/sketch-1.png";

fn object_detector(server: &MockServer) -> HttpObjectDetector {
    HttpObjectDetector::new(HttpObjectDetectorConfig {
        endpoint: format!("{}/llm/predict", server.uri()),
        ..HttpObjectDetectorConfig::default()
    })
    .unwrap()
}

fn text_detector(server: &MockServer, max_polls: u32) -> AzureReadDetector {
    AzureReadDetector::new(AzureReadConfig {
        endpoint: format!("{}/", server.uri()),
        subscription_key: "test-key".to_string(),
        poll_interval_ms: 1,
        max_polls,
        timeout_secs: 5,
    })
    .unwrap()
}

async fn mount_submit(server: &MockServer) {
    let operation_url = format!("{}/vision/v3.1/read/analyzeResults/op-1", server.uri());
    Mock::given(method("POST"))
        .and(path("/vision/v3.1/read/analyze"))
        .and(header("Ocp-Apim-Subscription-Key", "test-key"))
        .and(body_json(json!({ "url": IMAGE_URL })))
        .respond_with(
            ResponseTemplate::new(202).insert_header("Operation-Location", operation_url.as_str()),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_object_detector_sends_query_and_filters() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/llm/predict"))
        .and(query_param("image_url", IMAGE_URL))
        .and(query_param("model_name", "roboflow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"x": 115, "y": 215, "width": 30, "height": 30, "confidence": 0.91,
             "class": "checkbox", "class_id": 1, "coordinates": [100, 200, 130, 230]},
            {"class": "label", "coordinates": [140, 205, 260, 225]},
            {"class": "button", "coordinates": [300, 400, 200, 440]}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let detections = object_detector(&server)
        .detect_objects(IMAGE_URL)
        .await
        .unwrap();

    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].class, "checkbox");
    assert_eq!(detections[0].bbox.coordinates(), [100.0, 200.0, 130.0, 230.0]);
}

#[tokio::test]
async fn test_object_detector_reports_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/llm/predict"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = object_detector(&server)
        .detect_objects(IMAGE_URL)
        .await
        .unwrap_err();
    assert!(matches!(err, DetectionError::Status { status: 500, .. }));
}

#[tokio::test]
async fn test_text_detector_polls_until_succeeded() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path("/vision/v3.1/read/analyzeResults/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "running"})))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/vision/v3.1/read/analyzeResults/op-1"))
        .and(header("Ocp-Apim-Subscription-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "succeeded",
            "analyzeResult": {
                "version": "3.1.0",
                "readResults": [{
                    "page": 1, "angle": 0, "width": 800, "height": 600, "unit": "pixel",
                    "lines": [{
                        "text": "Remember me",
                        "boundingBox": [140, 207, 258, 205, 260, 225, 141, 224],
                        "words": []
                    }]
                }]
            }
        })))
        .mount(&server)
        .await;

    let detections = text_detector(&server, 5).detect_text(IMAGE_URL).await.unwrap();

    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].text, "Remember me");
    assert_eq!(detections[0].bbox.coordinates(), [140.0, 205.0, 260.0, 225.0]);
}

#[tokio::test]
async fn test_text_detector_gives_up_after_max_polls() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path("/vision/v3.1/read/analyzeResults/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "notStarted"})))
        .expect(3)
        .mount(&server)
        .await;

    let err = text_detector(&server, 3)
        .detect_text(IMAGE_URL)
        .await
        .unwrap_err();
    assert!(matches!(err, DetectionError::PollLimitExceeded(3)));
}

#[tokio::test]
async fn test_text_detector_failed_operation() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path("/vision/v3.1/read/analyzeResults/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "failed"})))
        .mount(&server)
        .await;

    let err = text_detector(&server, 3)
        .detect_text(IMAGE_URL)
        .await
        .unwrap_err();
    assert!(matches!(err, DetectionError::OperationFailed(status) if status == "failed"));
}

#[tokio::test]
async fn test_text_detector_requires_operation_location() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/vision/v3.1/read/analyze"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let err = text_detector(&server, 3)
        .detect_text(IMAGE_URL)
        .await
        .unwrap_err();
    assert!(matches!(err, DetectionError::MissingOperationLocation));
}
