//! SageMaker inference endpoint integration.

use super::{sigv4::Signer, Error, Summary};
use crate::config::SagemakerConfig;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "sagemaker";
const JSON: &str = "application/json";

#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub inputs: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct Generation {
    pub generated_text: String,
}

pub async fn summarize(
    client: &reqwest::Client,
    config: &SagemakerConfig,
    transcript: &str,
) -> Result<Summary, Error> {
    debug!("Invoking endpoint {}", config.endpoint_name);

    let body = serde_json::to_vec(&Request { inputs: transcript })?;
    let mut request = client
        .post(config.invocation_url.clone())
        .header(CONTENT_TYPE, JSON);
    if let Some(credentials) = &config.credentials {
        let signer = Signer {
            credentials,
            region: &config.region,
            service: SERVICE,
        };
        let headers = signer.sign(
            "POST",
            &config.invocation_url,
            &[(CONTENT_TYPE.as_str(), JSON)],
            &body,
            chrono::Utc::now(),
        );
        for (name, value) in headers {
            request = request.header(name, value);
        }
    } else {
        debug!("No AWS credentials, sending unsigned request");
    }

    let response = request.body(body).send().await?.error_for_status()?;

    let body = response.bytes().await?;
    let generations: Vec<Generation> = serde_json::from_slice(&body)?;

    match generations.into_iter().next() {
        Some(generation) => Ok(Summary::Generated(generation.generated_text)),
        None => {
            info!("No summary");
            Ok(Summary::Empty)
        }
    }
}
