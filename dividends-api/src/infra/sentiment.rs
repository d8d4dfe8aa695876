// This file is part of tao-dividends.
// Copyright (C) 2025 TAO Dividends Contributors
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::sentiment::{ScoreOutOfRangeError, SentimentClient, SentimentScore};
use dividends_common::domain::{Hotkey, NetUid};
use fastrace::trace;
use log::debug;
use regex::Regex;
use reqwest::{Client as HttpClient, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{sync::LazyLock, time::Duration};
use thiserror::Error;

static SCORE_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:sentiment[_ ]score|score)"?\s*(?:is|of|:|=)?\s*(-?\d+)"#)
        .expect("score phrase regex is valid")
});

static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+").expect("integer regex is valid"));

/// Config for the sentiment client.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "search")]
    pub search_config: SearchConfig,

    #[serde(rename = "llm")]
    pub llm_config: LlmConfig,

    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// Config for the social search service providing recent posts.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub url: String,

    pub api_key: SecretString,

    pub model: String,

    pub date_filter: String,
}

/// Config for the chat completions service scoring the posts.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub url: String,

    pub api_key: SecretString,

    pub model: String,

    pub max_tokens: u32,

    pub temperature: f32,
}

/// A [SentimentClient] searching recent posts about a network and letting an LLM score them.
#[derive(Debug, Clone)]
pub struct LlmSentimentClient {
    search_config: SearchConfig,
    llm_config: LlmConfig,
    http: HttpClient,
}

impl LlmSentimentClient {
    /// Create a new [LlmSentimentClient] with the given [Config].
    pub fn new(config: Config) -> Result<Self, LlmSentimentClientError> {
        let Config {
            search_config,
            llm_config,
            request_timeout,
        } = config;

        let http = HttpClient::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .map_err(LlmSentimentClientError::Client)?;

        Ok(Self {
            search_config,
            llm_config,
            http,
        })
    }

    #[trace]
    async fn search(&self, prompt: &str) -> Result<Value, LlmSentimentClientError> {
        let SearchConfig {
            url,
            api_key,
            model,
            date_filter,
        } = &self.search_config;

        let request = SearchRequest {
            prompt,
            tools: &["twitter"],
            model,
            date_filter,
            streaming: false,
        };

        let response = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| LlmSentimentClientError::Request(url.to_owned(), error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmSentimentClientError::Status(url.to_owned(), status));
        }

        response
            .json::<Value>()
            .await
            .map_err(|error| LlmSentimentClientError::Decode(url.to_owned(), error))
    }

    #[trace]
    async fn complete(&self, content: String) -> Result<String, LlmSentimentClientError> {
        let LlmConfig {
            url,
            api_key,
            model,
            max_tokens,
            temperature,
        } = &self.llm_config;

        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user".to_owned(),
                content,
            }],
            stream: false,
            max_tokens: *max_tokens,
            temperature: *temperature,
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| LlmSentimentClientError::Request(url.to_owned(), error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmSentimentClientError::Status(url.to_owned(), status));
        }

        let response = response
            .json::<ChatResponse>()
            .await
            .map_err(|error| LlmSentimentClientError::Decode(url.to_owned(), error))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(LlmSentimentClientError::NoChoices)
    }
}

impl SentimentClient for LlmSentimentClient {
    type Error = LlmSentimentClientError;

    #[trace(properties = { "netuid": "{netuid}", "hotkey": "{hotkey}" })]
    async fn score(&self, netuid: NetUid, hotkey: &Hotkey) -> Result<SentimentScore, Self::Error> {
        let posts = self.search(&format!("Bittensor netuid {netuid}")).await?;
        if is_empty(&posts) {
            return Err(LlmSentimentClientError::NoPosts(netuid));
        }

        let content = format!(
            "provide sentiment score on this from this nested dict after extracting relevant \
             data correctly: {posts}, where 100 is most positive and -100 being most negative, \
             return only integer, do not include an explanation, in response dict add key named \
             sentiment_score with sentiment score as value of it"
        );
        let completion = self.complete(content).await?;

        let score = extract_score(&completion)
            .ok_or_else(|| LlmSentimentClientError::NoScore(completion.clone()))?;
        let score = SentimentScore::try_from(score)?;
        debug!(netuid:%, hotkey:%, score:%; "sentiment scored");

        Ok(score)
    }
}

#[derive(Debug, Error)]
pub enum LlmSentimentClientError {
    #[error("cannot create HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("cannot send request to {0}")]
    Request(String, #[source] reqwest::Error),

    #[error("unexpected status {1} from {0}")]
    Status(String, StatusCode),

    #[error("cannot decode response from {0}")]
    Decode(String, #[source] reqwest::Error),

    #[error("no recent posts for netuid {0}")]
    NoPosts(NetUid),

    #[error("completion without choices")]
    NoChoices,

    #[error("no sentiment score in completion {0:?}")]
    NoScore(String),

    #[error(transparent)]
    OutOfRange(#[from] ScoreOutOfRangeError),
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    prompt: &'a str,
    tools: &'a [&'a str],
    model: &'a str,
    date_filter: &'a str,
    streaming: bool,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

fn is_empty(posts: &Value) -> bool {
    match posts {
        Value::Null => true,
        Value::Array(posts) => posts.is_empty(),
        Value::Object(posts) => posts.is_empty(),
        _ => false,
    }
}

/// Extract a sentiment score from an LLM completion: a JSON object with a `sentiment_score` or
/// `score` field, else a "score" phrase followed by an integer, else the first integer.
fn extract_score(completion: &str) -> Option<i64> {
    let json = completion
        .find('{')
        .zip(completion.rfind('}'))
        .filter(|(start, end)| start < end)
        .and_then(|(start, end)| serde_json::from_str::<Value>(&completion[start..=end]).ok());

    let from_json = json.and_then(|json| {
        ["sentiment_score", "score"]
            .into_iter()
            .find_map(|field| json.get(field).and_then(json_integer))
    });

    from_json
        .or_else(|| {
            SCORE_PHRASE
                .captures(completion)
                .and_then(|captures| captures.get(1))
                .and_then(|m| m.as_str().parse().ok())
        })
        .or_else(|| {
            INTEGER
                .find(completion)
                .and_then(|m| m.as_str().parse().ok())
        })
}

fn json_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|n| n.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
