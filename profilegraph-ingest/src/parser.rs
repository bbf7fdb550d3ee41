// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Extraction output parser
//!
//! Turns the oracle's raw text into typed candidates. This is the schema
//! stage of validation: a candidate that lacks a required field or names an
//! unknown type becomes a [`CandidateRejection`] and parsing continues. Only
//! output without a parsable outermost JSON object fails the whole batch.
//!
//! Confidence ranges and the acceptance threshold are checked later by
//! [`crate::validator`].

use profilegraph_core::{
    CandidateRejection, Difficulty, EdgeAttributes, EdgeType, EntityAttributes, EntityCandidate,
    EntityType, GraphError, GraphResult, RelationCandidate, ValidationError, Valence,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Entity arrays in the order their elements are indexed
const ENTITY_ARRAYS: [(&str, EntityType); 5] = [
    ("topics", EntityType::Topic),
    ("skills", EntityType::Skill),
    ("interests", EntityType::Interest),
    ("concepts", EntityType::Concept),
    ("personality_traits", EntityType::PersonalityTrait),
];

const RELATIONS_ARRAY: &str = "relationships";

/// Typed oracle output
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutput {
    pub entities: Vec<EntityCandidate>,
    /// Position of each entity candidate in the oracle output
    pub entity_indexes: Vec<usize>,
    pub relations: Vec<RelationCandidate>,
    pub relation_indexes: Vec<usize>,
    pub rejected: Vec<CandidateRejection>,
}

impl ExtractionOutput {
    /// Output built from already typed candidates
    pub fn from_candidates(entities: Vec<EntityCandidate>, relations: Vec<RelationCandidate>) -> Self {
        Self {
            entity_indexes: (0..entities.len()).collect(),
            relation_indexes: (0..relations.len()).collect(),
            entities,
            relations,
            rejected: Vec::new(),
        }
    }
}

/// Slice out the outermost `{...}` span, tolerating prose and code fences
fn outermost_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// Parse raw oracle output into candidates
pub fn parse_extraction(raw: &str) -> GraphResult<ExtractionOutput> {
    let span = outermost_object(raw).ok_or_else(|| {
        GraphError::ExtractionFormat("no JSON object in oracle output".to_string())
    })?;
    let value: Value = serde_json::from_str(span)
        .map_err(|e| GraphError::ExtractionFormat(e.to_string()))?;
    let root = value.as_object().ok_or_else(|| {
        GraphError::ExtractionFormat("oracle output is not a JSON object".to_string())
    })?;

    Ok(parse_root(root))
}

fn parse_root(root: &Map<String, Value>) -> ExtractionOutput {
    let mut output = ExtractionOutput::default();

    let mut index = 0;
    for (key, entity_type) in ENTITY_ARRAYS {
        for item in array_items(root, key) {
            match item.and_then(|obj| parse_entity(obj, entity_type)) {
                Ok(candidate) => {
                    output.entities.push(candidate);
                    output.entity_indexes.push(index);
                }
                Err((label, error)) => output
                    .rejected
                    .push(CandidateRejection::entity(index, label, error)),
            }
            index += 1;
        }
    }

    for (index, item) in array_items(root, RELATIONS_ARRAY).into_iter().enumerate() {
        match item.and_then(parse_relation) {
            Ok(candidate) => {
                output.relations.push(candidate);
                output.relation_indexes.push(index);
            }
            Err((label, error)) => output
                .rejected
                .push(CandidateRejection::relation(index, label, error)),
        }
    }

    output
}

type Rejected = (Option<String>, ValidationError);

/// Elements of a candidate array; a non-array value is one malformed element
fn array_items<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Vec<Result<&'a Map<String, Value>, Rejected>> {
    let malformed = |detail: String| (None, ValidationError::Malformed { detail });

    match root.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_object()
                    .ok_or_else(|| malformed(format!("`{}` element is not an object", key)))
            })
            .collect(),
        Some(_) => vec![Err(malformed(format!("`{}` is not an array", key)))],
    }
}

fn get<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|n| obj.get(*n))
        .find(|v| !v.is_null())
}

fn string(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    match get(obj, names)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number(obj: &Map<String, Value>, names: &[&str]) -> Option<f64> {
    match get(obj, names)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn boolean(obj: &Map<String, Value>, names: &[&str]) -> Option<bool> {
    match get(obj, names)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn strings(obj: &Map<String, Value>, names: &[&str]) -> Vec<String> {
    match get(obj, names) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn string_map(obj: &Map<String, Value>, names: &[&str]) -> BTreeMap<String, String> {
    match get(obj, names) {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k.clone(), s.clone())),
                Value::Null => None,
                other => Some((k.clone(), other.to_string())),
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn required_confidence(obj: &Map<String, Value>, label: &Option<String>) -> Result<f64, Rejected> {
    match get(obj, &["confidence", "confidence_score"]) {
        None => Err((
            label.clone(),
            ValidationError::MissingField {
                field: "confidence".to_string(),
            },
        )),
        Some(_) => number(obj, &["confidence", "confidence_score"]).ok_or_else(|| {
            (
                label.clone(),
                ValidationError::Malformed {
                    detail: "confidence is not a number".to_string(),
                },
            )
        }),
    }
}

fn parse_entity(obj: &Map<String, Value>, entity_type: EntityType) -> Result<EntityCandidate, Rejected> {
    let name = string(obj, &["name", "title", "label"]);
    let label = name.clone();
    let name = name.ok_or_else(|| {
        (
            None,
            ValidationError::MissingField {
                field: "name".to_string(),
            },
        )
    })?;

    // An explicit type on the element must agree with the array it sits in
    if let Some(declared) = string(obj, &["type", "entity_type"]) {
        match EntityType::parse(&declared) {
            Some(t) if t == entity_type => {}
            Some(_) | None => {
                return Err((label, ValidationError::UnknownEntityType { value: declared }));
            }
        }
    }

    let confidence = required_confidence(obj, &label)?;

    let type_prefix = match entity_type {
        EntityType::Topic => "topic",
        EntityType::Skill => "skill",
        EntityType::Interest => "interest",
        EntityType::Concept => "concept",
        EntityType::PersonalityTrait => "trait",
    };
    let category_alias = format!("{}_category", type_prefix);
    let subcategory_alias = format!("{}_subcategory", type_prefix);
    let category = string(obj, &["category", category_alias.as_str()]).unwrap_or_default();
    let subcategory = string(obj, &["subcategory", subcategory_alias.as_str()]).unwrap_or_default();

    let attributes = entity_attributes(obj, entity_type, category, subcategory);

    Ok(EntityCandidate {
        name,
        entity_type,
        confidence,
        evidence: string(obj, &["evidence", "evidence_text"]).unwrap_or_default(),
        attributes,
        milestone: string(obj, &["milestone", "milestone_achieved"]).filter(|s| !s.is_empty()),
        emotion: string(obj, &["emotion"]).filter(|s| !s.is_empty()),
        emotion_intensity: number(obj, &["emotion_intensity", "emotionIntensity"]),
    })
}

fn entity_attributes(
    obj: &Map<String, Value>,
    entity_type: EntityType,
    category: String,
    subcategory: String,
) -> EntityAttributes {
    let mut attributes = EntityAttributes::default_for(entity_type);

    match &mut attributes {
        EntityAttributes::Topic {
            knowledge_level,
            question_types,
            vocabulary_growth,
            ..
        } => {
            if let Some(v) = string(obj, &["knowledge_level", "knowledgeLevel"]) {
                *knowledge_level = v;
            }
            *question_types = strings(obj, &["question_types", "questionTypes"]);
            *vocabulary_growth = strings(obj, &["vocabulary_growth", "vocabularyGrowth"]);
        }
        EntityAttributes::Skill {
            developmental_stage,
            mastery_level,
            progression_rate,
            ..
        } => {
            if let Some(v) = string(obj, &["developmental_stage", "developmentalStage"]) {
                *developmental_stage = v;
            }
            if let Some(v) = string(obj, &["mastery_level", "masteryLevel"]) {
                *mastery_level = v;
            }
            if let Some(v) = string(obj, &["progression_rate", "progressionRate"]) {
                *progression_rate = v;
            }
        }
        EntityAttributes::Interest {
            engagement_level,
            initiation_frequency,
            persistence_level,
            emotional_connection,
            ..
        } => {
            if let Some(v) = number(obj, &["engagement_level", "engagementLevel"]) {
                *engagement_level = v.clamp(0.0, 1.0);
            }
            if let Some(v) = number(obj, &["initiation_frequency", "initiationFrequency"]) {
                *initiation_frequency = v.clamp(0.0, 1.0);
            }
            if let Some(v) = number(obj, &["persistence_level", "persistenceLevel"]) {
                *persistence_level = v.clamp(0.0, 1.0);
            }
            if let Some(v) = string(obj, &["emotional_connection", "emotionalConnection"]) {
                *emotional_connection = v;
            }
        }
        EntityAttributes::Concept {
            abstraction_level,
            understanding_level,
            cognitive_markers,
            ..
        } => {
            if let Some(v) = string(obj, &["abstraction_level", "abstractionLevel"]) {
                *abstraction_level = v;
            }
            if let Some(v) = number(obj, &["understanding_level", "understandingLevel"]) {
                *understanding_level = v.clamp(0.0, 1.0);
            }
            *cognitive_markers = string_map(obj, &["cognitive_markers", "cognitiveMarkers"]);
        }
        EntityAttributes::Trait {
            intensity,
            consistency,
            development_trend,
            ..
        } => {
            if let Some(v) = number(obj, &["intensity"]) {
                *intensity = v.clamp(0.0, 1.0);
            }
            if let Some(v) = number(obj, &["consistency"]) {
                *consistency = v.clamp(0.0, 1.0);
            }
            if let Some(v) = string(obj, &["development_trend", "developmentTrend"]) {
                *development_trend = v;
            }
        }
    }

    set_taxonomy(&mut attributes, category, subcategory);
    attributes
}

fn set_taxonomy(attributes: &mut EntityAttributes, new_category: String, new_subcategory: String) {
    match attributes {
        EntityAttributes::Topic {
            category,
            subcategory,
            ..
        }
        | EntityAttributes::Skill {
            category,
            subcategory,
            ..
        }
        | EntityAttributes::Interest {
            category,
            subcategory,
            ..
        }
        | EntityAttributes::Concept {
            category,
            subcategory,
            ..
        }
        | EntityAttributes::Trait {
            category,
            subcategory,
            ..
        } => {
            *category = new_category;
            *subcategory = new_subcategory;
        }
    }
}

fn parse_relation(obj: &Map<String, Value>) -> Result<RelationCandidate, Rejected> {
    let source_name = string(obj, &["sourceEntity", "source_entity", "source", "source_name"]);
    let target_name = string(obj, &["targetEntity", "target_entity", "target", "target_name"]);
    let label = match (&source_name, &target_name) {
        (Some(s), Some(t)) => Some(format!("{} -> {}", s, t)),
        (Some(s), None) => Some(s.clone()),
        (None, Some(t)) => Some(t.clone()),
        (None, None) => None,
    };

    let missing = |field: &str| {
        (
            label.clone(),
            ValidationError::MissingField {
                field: field.to_string(),
            },
        )
    };

    let source_name = source_name.ok_or_else(|| missing("sourceEntity"))?;
    let target_name = target_name.ok_or_else(|| missing("targetEntity"))?;
    let source_type = string(obj, &["sourceType", "source_type"]).ok_or_else(|| missing("sourceType"))?;
    let target_type = string(obj, &["targetType", "target_type"]).ok_or_else(|| missing("targetType"))?;
    let relation_type = string(obj, &["relationType", "relation_type", "edge_type", "type"])
        .ok_or_else(|| missing("relationType"))?;

    let source_type = EntityType::parse(&source_type)
        .ok_or_else(|| (label.clone(), ValidationError::UnknownEntityType { value: source_type }))?;
    let target_type = EntityType::parse(&target_type)
        .ok_or_else(|| (label.clone(), ValidationError::UnknownEntityType { value: target_type }))?;
    let edge_type = EdgeType::parse(&relation_type)
        .ok_or_else(|| (label.clone(), ValidationError::UnknownEdgeType { value: relation_type }))?;

    let confidence = required_confidence(obj, &label)?;

    // Attribute fields may sit in a nested object or on the relation itself
    let nested = match obj.get("attributes") {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    };
    let attr_number = |names: &[&str]| nested.and_then(|n| number(n, names)).or_else(|| number(obj, names));
    let attr_string = |names: &[&str]| nested.and_then(|n| string(n, names)).or_else(|| string(obj, names));
    let attr_bool = |names: &[&str]| nested.and_then(|n| boolean(n, names)).or_else(|| boolean(obj, names));

    let attributes = match edge_type {
        EdgeType::TemporalCooccurrence => EdgeAttributes::Cooccurrence {
            frequency: attr_number(&["cooccurrenceFrequency", "cooccurrence_frequency", "frequency"]),
            time_proximity: attr_number(&["timeProximity", "time_proximity"]),
        },
        EdgeType::LearningPathway => EdgeAttributes::LearningPathway {
            prerequisite: attr_bool(&["prerequisite", "isPrerequisite", "is_prerequisite"])
                .unwrap_or(false),
            difficulty: attr_string(&["difficulty"]).and_then(|d| parse_difficulty(&d)),
            mastery_required: attr_number(&["masteryRequired", "mastery_required"]),
        },
        EdgeType::EmotionalAssociation => EdgeAttributes::EmotionalAssociation {
            emotion: attr_string(&["emotion"]).filter(|s| !s.is_empty()),
            intensity: attr_number(&["intensity"]).map(|v| v.clamp(0.0, 1.0)),
            valence: attr_string(&["valence"]).and_then(|v| parse_valence(&v)),
        },
    };

    Ok(RelationCandidate {
        source_name,
        source_type,
        target_name,
        target_type,
        edge_type,
        confidence,
        evidence: string(obj, &["evidence", "evidence_text"]).unwrap_or_default(),
        attributes,
    })
}

fn parse_difficulty(s: &str) -> Option<Difficulty> {
    match s.trim().to_lowercase().as_str() {
        "easy" => Some(Difficulty::Easy),
        "medium" => Some(Difficulty::Medium),
        "hard" => Some(Difficulty::Hard),
        _ => None,
    }
}

fn parse_valence(s: &str) -> Option<Valence> {
    match s.trim().to_lowercase().as_str() {
        "positive" => Some(Valence::Positive),
        "negative" => Some(Valence::Negative),
        "neutral" => Some(Valence::Neutral),
        _ => None,
    }
}
