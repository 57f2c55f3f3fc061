use std::time::Duration;

use serde_derive::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::block::BlockData;
use crate::Result;

pub const CHALLENGE_NAME: &str = "mini_miner";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Always null in a fresh challenge
    #[serde(default)]
    pub nonce: Option<u64>,
    pub data: BlockData,
}

/// A proof of work challenge as served by the `problem` endpoint
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub difficulty: u32,
    pub block: Block,
}

impl Challenge {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Body posted to the `solve` endpoint: `{"nonce":42}`
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub status: u16,
    pub body: String,
}

impl SubmitOutcome {
    pub fn accepted(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct ChallengeClient {
    domain: String,
    token: String,
    client: reqwest::blocking::Client,
}

impl ChallengeClient {
    pub fn new(domain: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(ChallengeClient {
            domain: domain.into(),
            token: token.into(),
            client,
        })
    }

    /// `{domain}/challenges/mini_miner/{phase}?access_token={token}`
    pub fn endpoint(&self, phase: &str) -> String {
        format!(
            "{}/challenges/{}/{}?access_token={}",
            self.domain.trim_end_matches('/'),
            CHALLENGE_NAME,
            phase,
            self.token
        )
    }

    pub fn fetch_challenge(&self) -> Result<Challenge> {
        debug!(domain = %self.domain, "fetching challenge");
        let body = self
            .client
            .get(&self.endpoint("problem"))
            .send()?
            .error_for_status()?
            .bytes()?;
        let challenge = Challenge::from_slice(&body)?;
        info!(
            difficulty = challenge.difficulty,
            data = %challenge.block.data,
            "challenge received"
        );
        Ok(challenge)
    }

    /// Post the nonce. A non-2xx answer is reported through `SubmitOutcome`.
    pub fn submit(&self, nonce: u64) -> Result<SubmitOutcome> {
        debug!(nonce, "submitting solution");
        let response = self
            .client
            .post(&self.endpoint("solve"))
            .json(&Submission { nonce })
            .send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        info!(status, body = %body, "submission answered");
        Ok(SubmitOutcome { status, body })
    }
}
