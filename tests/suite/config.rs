//! Config file and registry resolution down to a working client.

use std::io::Write;

use arbor_config::{ArborConfig, ConfigError};
use arbor_providers::{ApiConfigError, LanguageModel, ModelRegistry, RegistryError};
use arbor_types::PromptSpec;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer};

use crate::common::{CHAT_PATH, completion};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn no_env(_: &str) -> Option<String> {
    None
}

#[tokio::test]
async fn config_file_drives_the_registered_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("authorization", "Bearer sk-file"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "stream": false})))
        .respond_with(completion("hello"))
        .expect(1)
        .mount(&server)
        .await;

    let file = write_config(&format!(
        "[model]\nname = \"OpenAI\"\nid = \"gpt-4o-mini\"\napi_key = \"sk-file\"\n\
         base_url = \"{}/v1\"\nstream = false\n",
        server.uri()
    ));
    let config = ArborConfig::load_from(file.path()).unwrap();
    let api = config.api_config(no_env).unwrap();
    let client = ModelRegistry::default()
        .build(config.model_name(), &api)
        .unwrap();

    // Streaming is disabled in the file, so this goes out as a blocking call.
    let reply = client
        .generate_streaming(&PromptSpec::user("hi"))
        .await
        .unwrap();
    assert_eq!(reply, "hello");
}

#[tokio::test]
async fn environment_overrides_the_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("authorization", "Bearer sk-env"))
        .respond_with(completion("from env"))
        .expect(1)
        .mount(&server)
        .await;

    let file = write_config(
        "[model]\napi_key = \"sk-file\"\nbase_url = \"http://127.0.0.1:9/v1\"\n",
    );
    let config = ArborConfig::load_from(file.path()).unwrap();
    let base_url = format!("{}/v1", server.uri());
    let api = config
        .api_config(|name| match name {
            "OPENAI_API_KEY" => Some("sk-env".to_string()),
            "OPENAI_BASE_URL" => Some(base_url.clone()),
            _ => None,
        })
        .unwrap();

    let client = ModelRegistry::default().build("OpenAI", &api).unwrap();
    assert_eq!(client.generate(&PromptSpec::user("hi")).await.unwrap(), "from env");
}

#[test]
fn unknown_model_name_lists_registered_models() {
    let file = write_config("[model]\nname = \"Mystery\"\napi_key = \"sk-file\"\n");
    let config = ArborConfig::load_from(file.path()).unwrap();
    let api = config.api_config(no_env).unwrap();

    let Err(err) = ModelRegistry::default().build(config.model_name(), &api) else {
        panic!("unknown model should not build");
    };
    match err {
        RegistryError::UnknownModel { name, known } => {
            assert_eq!(name, "Mystery");
            assert_eq!(known, vec!["OpenAI".to_string()]);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn missing_api_key_is_reported() {
    let file = write_config("[search]\nstrategy = \"vote\"\n");
    let config = ArborConfig::load_from(file.path()).unwrap();

    assert!(matches!(
        config.api_config(no_env),
        Err(ConfigError::Api(ApiConfigError::MissingApiKey))
    ));
}

#[test]
fn unknown_keys_are_rejected() {
    let file = write_config("[search]\nbreadht = 3\n");
    assert!(matches!(
        ArborConfig::load_from(file.path()),
        Err(ConfigError::Parse { .. })
    ));
}
