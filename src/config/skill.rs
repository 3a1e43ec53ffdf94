//! Skill response configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::application::ResultCardImages;

/// Illustrations shown on the analysis result card
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillConfig {
    /// Shown when asthma is judged possible
    #[serde(default)]
    pub high_risk_image_url: String,

    /// Shown for every other judgement
    #[serde(default)]
    pub low_risk_image_url: String,
}

impl SkillConfig {
    pub fn card_images(&self) -> ResultCardImages {
        ResultCardImages {
            high_risk_url: self.high_risk_image_url.clone(),
            low_risk_url: self.low_risk_image_url.clone(),
        }
    }

    /// Validate skill configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_url(&self.high_risk_image_url, "skill.high_risk_image_url")?;
        check_url(&self.low_risk_image_url, "skill.low_risk_image_url")
    }
}

fn check_url(url: &str, name: &'static str) -> Result<(), ValidationError> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(ValidationError::InvalidUrl(name))
    }
}
