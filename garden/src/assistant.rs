//! Plant care chat.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures_timer::Delay;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{PlantRecord, Sunlight, Temperature, Watering};

/// Who wrote a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The gardener.
    User,
    /// The plant assistant.
    Assistant,
}

/// One line of a plant chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author.
    pub role: Role,
    /// Text.
    pub content: String,
}

/// What a question is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Hello or hi.
    Greeting,
    /// Watering.
    Watering,
    /// Light or sun.
    Light,
    /// Temperature, warmth or cold.
    Temperature,
    /// Fertilizer or feeding.
    Feeding,
    /// Propagation or cuttings.
    Propagation,
    /// Pests, bugs or insects.
    Pests,
    /// Anything else.
    General,
}

impl Topic {
    /// Classify a question by keyword. The first matching topic wins, in
    /// declaration order.
    #[must_use]
    pub fn of(question: &str) -> Self {
        let question = question.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| question.contains(n));
        let greets = question
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == "hello" || word == "hi");

        if greets {
            Self::Greeting
        } else if has(&["water"]) {
            Self::Watering
        } else if has(&["light", "sun"]) {
            Self::Light
        } else if has(&["temperature", "warm", "cold"]) {
            Self::Temperature
        } else if has(&["fertiliz", "feed"]) {
            Self::Feeding
        } else if has(&["propagat", "cutting"]) {
            Self::Propagation
        } else if has(&["pest", "bugs", "insects"]) {
            Self::Pests
        } else {
            Self::General
        }
    }
}

/// Assistant settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Shortest simulated typing delay in milliseconds.
    pub min_latency_ms: u64,
    /// Longest simulated typing delay in milliseconds.
    pub max_latency_ms: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            min_latency_ms: 1_000,
            max_latency_ms: 2_000,
        }
    }
}

/// A conversation about one plant.
#[derive(Debug, Clone)]
pub struct PlantChat {
    plant: PlantRecord,
    messages: Vec<ChatMessage>,
}

impl PlantChat {
    /// Open a chat, starting with the assistant's welcome.
    #[must_use]
    pub fn new(plant: PlantRecord) -> Self {
        let welcome = ChatMessage {
            role: Role::Assistant,
            content: PlantAssistant::welcome(&plant),
        };
        Self {
            plant,
            messages: vec![welcome],
        }
    }

    /// The plant being discussed.
    #[must_use]
    pub const fn plant(&self) -> &PlantRecord {
        &self.plant
    }

    /// Every message so far, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

/// Answers care questions from a plant's record.
///
/// Replies are canned text keyed on [`Topic`]. Questions that match no topic
/// get a care summary quoting one of the plant's tips at random.
pub struct PlantAssistant {
    config: AssistantConfig,
    rng: Mutex<StdRng>,
}

impl PlantAssistant {
    /// Create an assistant seeded from system entropy.
    #[must_use]
    pub fn new(config: AssistantConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create an assistant with a fixed seed.
    #[must_use]
    pub fn with_seed(config: AssistantConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: AssistantConfig, rng: StdRng) -> Self {
        Self {
            config: AssistantConfig {
                max_latency_ms: config.max_latency_ms.max(config.min_latency_ms),
                ..config
            },
            rng: Mutex::new(rng),
        }
    }

    /// Current settings.
    #[must_use]
    pub const fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// The greeting that opens every chat.
    #[must_use]
    pub fn welcome(plant: &PlantRecord) -> String {
        format!(
            "Hello! I'm your plant assistant. I can answer questions about your {}. What would you like to know?",
            plant.name
        )
    }

    /// Answer `question` about `plant`.
    #[must_use]
    pub fn reply(&self, plant: &PlantRecord, question: &str) -> String {
        let name = &plant.name;
        match Topic::of(question) {
            Topic::Greeting => format!(
                "Hello! I'm happy to answer any questions about your {name}. What would you like to know?"
            ),
            Topic::Watering => watering_reply(plant),
            Topic::Light => light_reply(plant),
            Topic::Temperature => temperature_reply(plant),
            Topic::Feeding => format!(
                "For your {name}, use a balanced houseplant fertilizer diluted to half strength during the growing season (spring and summer). Reduce or eliminate fertilization during fall and winter when growth naturally slows."
            ),
            Topic::Propagation => format!(
                "{name} can typically be propagated through stem cuttings. Take a 4-6 inch cutting just below a node, remove lower leaves, and place in water or moist soil. Keep warm and humid until roots develop."
            ),
            Topic::Pests => format!(
                "Common pests for {name} include spider mites, mealybugs, and scale insects. Regularly inspect the leaves (top and bottom) and stems. Treat early infestations with neem oil or insecticidal soap, ensuring to follow the product instructions carefully."
            ),
            Topic::General => self.summary(plant),
        }
    }

    fn summary(&self, plant: &PlantRecord) -> String {
        let mut text = format!(
            "Your {} ({}) thrives with {} watering, {} light, and {} temperatures. {}",
            plant.name, plant.species, plant.watering, plant.sunlight, plant.temperature, plant.description
        );
        if !plant.tips.is_empty() {
            let pick = self
                .rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .gen_range(0..plant.tips.len());
            text.push_str(" Here's a key tip: ");
            text.push_str(&plant.tips[pick]);
        }
        text
    }

    fn typing_delay(&self) -> Duration {
        let AssistantConfig {
            min_latency_ms,
            max_latency_ms,
        } = self.config;
        let ms = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(min_latency_ms..=max_latency_ms);
        Duration::from_millis(ms)
    }

    /// Add `question` to `chat` and, after a typing delay, the reply.
    ///
    /// Blank questions are ignored and return `None`.
    pub async fn ask<'c>(&self, chat: &'c mut PlantChat, question: &str) -> Option<&'c ChatMessage> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }
        chat.messages.push(ChatMessage {
            role: Role::User,
            content: question.to_owned(),
        });

        let content = self.reply(&chat.plant, question);
        let delay = self.typing_delay();
        debug!("answering {:?} about {} in {delay:?}", Topic::of(question), chat.plant.name);
        Delay::new(delay).await;

        chat.messages.push(ChatMessage {
            role: Role::Assistant,
            content,
        });
        chat.messages.last()
    }
}

impl Default for PlantAssistant {
    fn default() -> Self {
        Self::new(AssistantConfig::default())
    }
}

impl fmt::Debug for PlantAssistant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlantAssistant")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn watering_reply(plant: &PlantRecord) -> String {
    let name = &plant.name;
    match plant.watering {
        Watering::Low => format!(
            "Your {name} has low watering needs. Allow the soil to dry out completely between waterings."
        ),
        Watering::Medium => format!(
            "Your {name} has moderate watering needs. Water when the top inch or two of soil is dry."
        ),
        Watering::High => format!(
            "Your {name} requires frequent watering. Keep the soil consistently moist but never waterlogged."
        ),
    }
}

fn light_reply(plant: &PlantRecord) -> String {
    let name = &plant.name;
    match plant.sunlight {
        Sunlight::Low => format!(
            "Your {name} thrives in low light conditions. It's perfect for areas away from windows or in rooms with minimal natural light."
        ),
        Sunlight::Partial => format!(
            "Your {name} prefers partial sunlight. Bright, indirect light is ideal. Near a window with filtered light works well."
        ),
        Sunlight::Full => format!(
            "Your {name} loves bright light. Place it near a south-facing window where it can get several hours of direct sunlight daily."
        ),
    }
}

fn temperature_reply(plant: &PlantRecord) -> String {
    let name = &plant.name;
    match plant.temperature {
        Temperature::Cool => format!(
            "Your {name} prefers cooler temperatures, ideally between 55-65°F (13-18°C). Keep it away from heaters and warm drafts."
        ),
        Temperature::Average => format!(
            "Your {name} thrives in average room temperatures between 65-75°F (18-24°C), which is perfect for most homes."
        ),
        Temperature::Warm => format!(
            "Your {name} enjoys warm conditions between 75-85°F (24-29°C). Make sure it's not exposed to cold drafts or air conditioning vents."
        ),
    }
}
