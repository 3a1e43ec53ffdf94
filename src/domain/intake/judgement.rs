//! Decision engine - rule-based asthma screening.
//!
//! A pure function from extracted symptom data to a [`Judgement`]. The
//! rule is evaluated as a gate sequence and stops at the first stage
//! that decides:
//!
//! 1. Input that is not a symptom mapping is insufficient.
//! 2. Resolving symptoms, fever or sore throat point to a cold: low.
//! 3. Without a characteristic symptom (wheeze, dyspnea, chest tightness,
//!    nocturnal symptoms) recurring over three months or more: low.
//! 4. Asthma predictive index: one major criterion (family history, atopy)
//!    or two minor criteria (airborne, food sensitization): present.
//!    Otherwise low.
//!
//! This is a screening heuristic, not a diagnosis.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::symptoms::{ExtractedData, SymptomField};

/// Substring marking a pattern of three months or longer.
pub const FREQUENCY_MARKER: &str = "3개월";

const ASTHMA_SYMPTOMS: [SymptomField; 4] = [
    SymptomField::Wheeze,
    SymptomField::Dyspnea,
    SymptomField::ChestTightness,
    SymptomField::Nocturnal,
];

const COLD_SIGNS: [SymptomField; 3] = [
    SymptomField::Resolution,
    SymptomField::Fever,
    SymptomField::SoreThroat,
];

const MAJOR_CRITERIA: [SymptomField; 2] = [SymptomField::FamilyHistory, SymptomField::AtopyHistory];

const MINOR_CRITERIA: [SymptomField; 2] =
    [SymptomField::AirborneAllergen, SymptomField::FoodAllergen];

/// Screening outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Possibility {
    Present,
    Low,
    Insufficient,
}

impl Possibility {
    /// User-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Possibility::Present => "있음",
            Possibility::Low => "낮음",
            Possibility::Insufficient => "정보 부족",
        }
    }
}

impl fmt::Display for Possibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Possibility plus the reason of the stage that decided it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judgement {
    pub possibility: Possibility,
    pub reason: String,
}

impl Judgement {
    fn new(possibility: Possibility, reason: &str) -> Self {
        Self {
            possibility,
            reason: reason.to_string(),
        }
    }

    pub fn insufficient() -> Self {
        Self::new(
            Possibility::Insufficient,
            "분석할 증상 정보가 충분하지 않습니다.",
        )
    }
}

/// Judges a validated snapshot.
pub fn judge(data: &ExtractedData) -> Judgement {
    if COLD_SIGNS.iter().any(|f| data.is_affirmative(*f)) {
        return Judgement::new(
            Possibility::Low,
            "증상이 완화되고 있거나, 감기를 시사하는 증상(발열, 인후통)이 동반됩니다.",
        );
    }

    let has_asthma_symptoms = ASTHMA_SYMPTOMS.iter().any(|f| data.is_affirmative(*f));
    let is_frequent = data.contains(SymptomField::Duration, FREQUENCY_MARKER)
        || data.contains(SymptomField::BronchodilatorUse, FREQUENCY_MARKER);

    if !has_asthma_symptoms || !is_frequent {
        return Judgement::new(
            Possibility::Low,
            "천식을 의심할 만한 특징적인 증상이나 발생 빈도가 확인되지 않았습니다.",
        );
    }

    let major_count = count_affirmative(data, &MAJOR_CRITERIA);
    let minor_count = count_affirmative(data, &MINOR_CRITERIA);

    if major_count >= 1 || minor_count >= 2 {
        return Judgement::new(
            Possibility::Present,
            "천식 예측지수(API) 평가 결과, 주요 인자 또는 부가 인자 조건을 충족합니다.",
        );
    }

    Judgement::new(
        Possibility::Low,
        "천식 의심 증상은 있으나, 천식 예측지수(API)의 위험인자 조건을 충족하지 않습니다.",
    )
}

/// Judges raw analysis output; anything but a JSON object is insufficient.
pub fn judge_value(value: &Value) -> Judgement {
    match ExtractedData::from_json(value) {
        Some(data) => judge(&data),
        None => Judgement::insufficient(),
    }
}

fn count_affirmative(data: &ExtractedData, fields: &[SymptomField]) -> usize {
    fields.iter().filter(|f| data.is_affirmative(**f)).count()
}
