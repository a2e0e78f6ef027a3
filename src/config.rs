//! Step configuration.
//!
//! Settings arrive as a flat table of strings (the process environment
//! in production) and are pulled into [`Settings`] through a small serde
//! adapter. [`Config`] is the resolved form handed to the rest of the
//! crate, with the summarization backend narrowed to a closed [`Backend`].

use serde::{
    de::{
        value::StrDeserializer, DeserializeOwned, DeserializeSeed, IntoDeserializer, SeqAccess,
        Visitor,
    },
    Deserialize, Deserializer,
};
use std::{collections::HashMap, fmt, path::PathBuf, str::FromStr};
use url::Url;

pub type Table = HashMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("internal")]
    Internal,

    #[error("not supported")]
    NotSupported,

    #[error("not found")]
    NotFound,

    #[error("missing setting {0}")]
    Missing(&'static str),

    #[error("invalid setting {0}: {1}")]
    Invalid(&'static str, String),

    #[error("serde: {0}")]
    Serde(String),
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(t: T) -> Self {
        Error::Serde(t.to_string())
    }
}

/// Deserialize a struct from a table of string settings.
///
/// Struct fields are looked up by their (renamed) field name. Absent and
/// empty values are treated the same way.
pub fn from_table<'de, T>(table: &'de Table) -> Result<T, Error>
where
    T: Deserialize<'de>,
{
    let mut deserializer = TableDeserializer { table, field: None };
    let t = T::deserialize(&mut deserializer)?;
    Ok(t)
}

/// Deserialize a struct from the process environment.
pub fn from_env<T>() -> Result<T, Error>
where
    T: DeserializeOwned,
{
    // Non-unicode variables cannot be settings; skip them instead of panicking.
    let table: Table = std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect();
    from_table(&table)
}

struct TableDeserializer<'de> {
    table: &'de Table,
    field: Option<&'static str>,
}

impl<'de> TableDeserializer<'de> {
    fn value(&self) -> Result<&'de str, Error> {
        let field = self.field.ok_or(Error::Internal)?;
        match self.table.get(field) {
            Some(value) if !value.is_empty() => Ok(value.as_str()),
            _ => Err(Error::NotFound),
        }
    }

    fn parse<T>(&self) -> Result<T, Error>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.value()?.parse().map_err(serde::de::Error::custom)
    }
}

impl<'de, 'a> Deserializer<'de> for &'a mut TableDeserializer<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, _: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(Error::NotSupported)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.value()?.to_string())
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_borrowed_str(self.value()?)
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_bool(self.parse()?)
    }

    fn deserialize_i64<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_i64(self.parse()?)
    }

    fn deserialize_u64<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_u64(self.parse()?)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let variant: StrDeserializer<'de, Error> = self.value()?.into_deserializer();
        visitor.visit_enum(variant)
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        struct Access<'de> {
            fields: &'static [&'static str],
            table: &'de Table,
        }

        impl<'de> SeqAccess<'de> for Access<'de> {
            type Error = Error;

            fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
            where
                T: DeserializeSeed<'de>,
            {
                if let Some((field, fields)) = self.fields.split_first() {
                    self.fields = fields;
                    let mut deserializer = TableDeserializer {
                        table: self.table,
                        field: Some(*field),
                    };
                    match DeserializeSeed::deserialize(seed, &mut deserializer) {
                        Ok(value) => Ok(Some(value)),
                        Err(Error::NotFound) => Ok(None),
                        Err(err) => Err(err),
                    }
                } else {
                    Ok(None)
                }
            }
        }

        visitor.visit_seq(Access {
            fields,
            table: self.table,
        })
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value() {
            Ok(_) => visitor.visit_some(self),
            Err(Error::NotFound) => visitor.visit_none(),
            Err(err) => Err(err),
        }
    }

    serde::forward_to_deserialize_any! {
            i8 i16 i32 i128
            u8 u16 u32 u128
            f32 f64
            char bytes byte_buf
            unit unit_struct newtype_struct seq tuple
            tuple_struct map identifier ignored_any
    }
}

/// Which summarization service to call, as named in `SUMMARY_TYPE`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryType {
    #[default]
    Disabled,
    Sagemaker,
    Anthropic,
}

/// Raw settings, one field per environment variable.
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    #[serde(rename = "OUTPUT_BUCKET_NAME")]
    pub output_bucket: Option<String>,
    #[serde(rename = "SUMMARY_TYPE", default)]
    pub summary_type: SummaryType,
    #[serde(rename = "TOKEN_COUNT", default)]
    pub token_count: i64,
    #[serde(rename = "SUMMARY_SAGEMAKER_ENDPOINT")]
    pub sagemaker_endpoint: Option<String>,
    #[serde(rename = "SAGEMAKER_RUNTIME_URL")]
    pub sagemaker_runtime_url: Option<Url>,
    #[serde(rename = "AWS_REGION", default = "Settings::default_region")]
    pub region: String,
    #[serde(rename = "AWS_ACCESS_KEY_ID")]
    pub aws_access_key_id: Option<String>,
    #[serde(rename = "AWS_SECRET_ACCESS_KEY")]
    pub aws_secret_access_key: Option<String>,
    #[serde(rename = "AWS_SESSION_TOKEN")]
    pub aws_session_token: Option<String>,
    #[serde(
        rename = "ANTHROPIC_MODEL_IDENTIFIER",
        default = "Settings::default_anthropic_model"
    )]
    pub anthropic_model: String,
    #[serde(rename = "ANTHROPIC_ENDPOINT_URL")]
    pub anthropic_endpoint_url: Option<Url>,
    #[serde(rename = "ANTHROPIC_API_KEY")]
    pub anthropic_api_key: Option<String>,
    #[serde(
        rename = "SUMMARY_PROMPT_TEMPLATE",
        default = "Settings::default_prompt_template"
    )]
    pub prompt_template: String,
    #[serde(rename = "STORAGE_ROOT", default = "Settings::default_storage_root")]
    pub storage_root: PathBuf,
    #[serde(rename = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Settings {
    fn default_region() -> String {
        "us-east-1".to_string()
    }

    fn default_anthropic_model() -> String {
        "claude-instant-v1-100k".to_string()
    }

    fn default_prompt_template() -> String {
        "<br><br>Human:<br>{transcript}<br><br>Summarize the above transcript in no more than 5 \
         sentences, using gender neutral pronouns. Were the caller's needs met during the \
         call?<br><br>Assistant: Here is a summary in 5 sentences:"
            .to_string()
    }

    fn default_storage_root() -> PathBuf {
        PathBuf::from(".")
    }
}

/// AWS credentials used to sign runtime requests.
#[derive(Clone, PartialEq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SagemakerConfig {
    pub endpoint_name: String,
    /// Full invocation URL, `<runtime>/endpoints/<name>/invocations`.
    pub invocation_url: Url,
    pub region: String,
    /// Requests are sent unsigned when absent, which only a signing proxy
    /// named by `SAGEMAKER_RUNTIME_URL` will accept.
    pub credentials: Option<AwsCredentials>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnthropicConfig {
    pub endpoint_url: Url,
    pub api_key: String,
    pub model: String,
    pub prompt_template: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Backend {
    Disabled,
    Sagemaker(SagemakerConfig),
    Anthropic(AnthropicConfig),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub output_bucket: String,
    /// Transcript token budget; zero or negative disables truncation.
    pub token_count: i64,
    pub backend: Backend,
    pub storage_root: PathBuf,
    pub log_level: log::LevelFilter,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_settings(from_env()?)
    }

    pub fn from_table(table: &Table) -> Result<Self, Error> {
        Self::from_settings(from_table(table)?)
    }

    pub fn from_settings(settings: Settings) -> Result<Self, Error> {
        let output_bucket = settings
            .output_bucket
            .ok_or(Error::Missing("OUTPUT_BUCKET_NAME"))?;

        let log_level = match settings.log_level {
            Some(level) => level
                .parse()
                .map_err(|_| Error::Invalid("LOG_LEVEL", level))?,
            None => log::LevelFilter::Info,
        };

        let backend = match settings.summary_type {
            SummaryType::Disabled => Backend::Disabled,
            SummaryType::Sagemaker => {
                let endpoint_name = settings
                    .sagemaker_endpoint
                    .ok_or(Error::Missing("SUMMARY_SAGEMAKER_ENDPOINT"))?;
                let credentials = match (
                    settings.aws_access_key_id,
                    settings.aws_secret_access_key,
                ) {
                    (Some(access_key_id), Some(secret_access_key)) => Some(AwsCredentials {
                        access_key_id,
                        secret_access_key,
                        session_token: settings.aws_session_token,
                    }),
                    (Some(_), None) => return Err(Error::Missing("AWS_SECRET_ACCESS_KEY")),
                    (None, Some(_)) => return Err(Error::Missing("AWS_ACCESS_KEY_ID")),
                    (None, None) => None,
                };
                let runtime_url = match settings.sagemaker_runtime_url {
                    Some(url) => url,
                    // The AWS runtime rejects unsigned requests.
                    None if credentials.is_none() => {
                        return Err(Error::Missing("AWS_ACCESS_KEY_ID"))
                    }
                    None => {
                        let url =
                            format!("https://runtime.sagemaker.{}.amazonaws.com", settings.region);
                        Url::parse(&url)
                            .map_err(|err| Error::Invalid("AWS_REGION", err.to_string()))?
                    }
                };
                let invocation_url = invocation_url(runtime_url, &endpoint_name)?;
                Backend::Sagemaker(SagemakerConfig {
                    endpoint_name,
                    invocation_url,
                    region: settings.region,
                    credentials,
                })
            }
            SummaryType::Anthropic => Backend::Anthropic(AnthropicConfig {
                endpoint_url: settings
                    .anthropic_endpoint_url
                    .ok_or(Error::Missing("ANTHROPIC_ENDPOINT_URL"))?,
                api_key: settings
                    .anthropic_api_key
                    .ok_or(Error::Missing("ANTHROPIC_API_KEY"))?,
                model: settings.anthropic_model,
                prompt_template: settings.prompt_template,
            }),
        };

        Ok(Config {
            output_bucket,
            token_count: settings.token_count,
            backend,
            storage_root: settings.storage_root,
            log_level,
        })
    }
}

fn invocation_url(mut runtime_url: Url, endpoint_name: &str) -> Result<Url, Error> {
    if runtime_url.cannot_be_a_base() {
        return Err(Error::Invalid(
            "SAGEMAKER_RUNTIME_URL",
            runtime_url.to_string(),
        ));
    }
    if let Ok(mut segments) = runtime_url.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend(&["endpoints", endpoint_name, "invocations"]);
    }
    Ok(runtime_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(pairs: &[(&str, &str)]) -> Table {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_to_disabled() -> Result<(), Error> {
        let config = Config::from_table(&table(&[("OUTPUT_BUCKET_NAME", "pca-output")]))?;

        assert_eq!(
            config,
            Config {
                output_bucket: "pca-output".to_string(),
                token_count: 0,
                backend: Backend::Disabled,
                storage_root: PathBuf::from("."),
                log_level: log::LevelFilter::Info,
            }
        );

        Ok(())
    }

    #[test]
    fn parse_sagemaker() -> Result<(), Error> {
        let config = Config::from_table(&table(&[
            ("OUTPUT_BUCKET_NAME", "pca-output"),
            ("SUMMARY_TYPE", "SAGEMAKER"),
            ("SUMMARY_SAGEMAKER_ENDPOINT", "summarizer"),
            ("AWS_REGION", "eu-west-2"),
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("TOKEN_COUNT", "-3"),
            ("LOG_LEVEL", "debug"),
        ]))?;

        assert_eq!(config.token_count, -3);
        assert_eq!(config.log_level, log::LevelFilter::Debug);
        assert_eq!(
            config.backend,
            Backend::Sagemaker(SagemakerConfig {
                endpoint_name: "summarizer".to_string(),
                invocation_url: Url::parse(
                    "https://runtime.sagemaker.eu-west-2.amazonaws.com/endpoints/summarizer/invocations"
                )
                .unwrap(),
                region: "eu-west-2".to_string(),
                credentials: Some(AwsCredentials {
                    access_key_id: "AKID".to_string(),
                    secret_access_key: "secret".to_string(),
                    session_token: None,
                }),
            })
        );

        Ok(())
    }

    #[test]
    fn aws_runtime_requires_credentials() {
        let result = Config::from_table(&table(&[
            ("OUTPUT_BUCKET_NAME", "pca-output"),
            ("SUMMARY_TYPE", "SAGEMAKER"),
            ("SUMMARY_SAGEMAKER_ENDPOINT", "summarizer"),
        ]));

        assert!(matches!(result, Err(Error::Missing("AWS_ACCESS_KEY_ID"))));
    }

    #[test]
    fn partial_credentials_are_rejected() {
        let result = Config::from_table(&table(&[
            ("OUTPUT_BUCKET_NAME", "pca-output"),
            ("SUMMARY_TYPE", "SAGEMAKER"),
            ("SUMMARY_SAGEMAKER_ENDPOINT", "summarizer"),
            ("SAGEMAKER_RUNTIME_URL", "http://localhost:8080"),
            ("AWS_ACCESS_KEY_ID", "AKID"),
        ]));

        assert!(matches!(result, Err(Error::Missing("AWS_SECRET_ACCESS_KEY"))));
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let credentials = AwsCredentials {
            access_key_id: "AKID".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: Some("session".to_string()),
        };

        let debug = format!("{:?}", credentials);
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("secret\""));
        assert!(!debug.contains("session\""));
    }

    #[test]
    fn sagemaker_runtime_override_keeps_prefix() -> Result<(), Error> {
        let config = Config::from_table(&table(&[
            ("OUTPUT_BUCKET_NAME", "pca-output"),
            ("SUMMARY_TYPE", "SAGEMAKER"),
            ("SUMMARY_SAGEMAKER_ENDPOINT", "summarizer"),
            ("SAGEMAKER_RUNTIME_URL", "http://localhost:8080/proxy/"),
        ]))?;

        match config.backend {
            Backend::Sagemaker(sagemaker) => assert_eq!(
                sagemaker.invocation_url.as_str(),
                "http://localhost:8080/proxy/endpoints/summarizer/invocations"
            ),
            other => panic!("unexpected backend {:?}", other),
        }

        Ok(())
    }

    #[test]
    fn parse_anthropic_with_defaults() -> Result<(), Error> {
        let config = Config::from_table(&table(&[
            ("OUTPUT_BUCKET_NAME", "pca-output"),
            ("SUMMARY_TYPE", "ANTHROPIC"),
            ("ANTHROPIC_ENDPOINT_URL", "https://api.example.com/v1/complete"),
            ("ANTHROPIC_API_KEY", "secret"),
        ]))?;

        match config.backend {
            Backend::Anthropic(anthropic) => {
                assert_eq!(anthropic.model, "claude-instant-v1-100k");
                assert_eq!(anthropic.api_key, "secret");
                assert!(anthropic.prompt_template.contains("{transcript}"));
                assert!(anthropic.prompt_template.starts_with("<br><br>Human:"));
            }
            other => panic!("unexpected backend {:?}", other),
        }

        Ok(())
    }

    #[test]
    fn unknown_summary_type_is_rejected() {
        let result = Config::from_table(&table(&[
            ("OUTPUT_BUCKET_NAME", "pca-output"),
            ("SUMMARY_TYPE", "SAGEMKER"),
        ]));

        assert!(matches!(result, Err(Error::Serde(_))));
    }

    #[test]
    fn missing_bucket_is_rejected() {
        let result = Config::from_table(&Table::new());

        assert!(matches!(result, Err(Error::Missing("OUTPUT_BUCKET_NAME"))));
    }

    #[test]
    fn anthropic_requires_endpoint() {
        let result = Config::from_table(&table(&[
            ("OUTPUT_BUCKET_NAME", "pca-output"),
            ("SUMMARY_TYPE", "ANTHROPIC"),
            ("ANTHROPIC_API_KEY", "secret"),
        ]));

        assert!(matches!(result, Err(Error::Missing("ANTHROPIC_ENDPOINT_URL"))));
    }

    #[test]
    fn empty_values_count_as_missing() -> Result<(), Error> {
        let config = Config::from_table(&table(&[
            ("OUTPUT_BUCKET_NAME", "pca-output"),
            ("SUMMARY_TYPE", ""),
            ("TOKEN_COUNT", ""),
        ]))?;

        assert_eq!(config.backend, Backend::Disabled);
        assert_eq!(config.token_count, 0);

        Ok(())
    }

    #[test]
    fn malformed_token_count_is_rejected() {
        let result = Config::from_table(&table(&[
            ("OUTPUT_BUCKET_NAME", "pca-output"),
            ("TOKEN_COUNT", "many"),
        ]));

        assert!(matches!(result, Err(Error::Serde(_))));
    }
}
