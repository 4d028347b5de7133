use crate::{CareInstructions, Identification, Sunlight, Temperature, Watering};

/// A plant the mock identifier can recognise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantProfile {
    /// Common name.
    pub name: &'static str,
    /// Botanical name.
    pub species: &'static str,
    /// Confidence before jitter.
    pub base_confidence: f32,
    /// Watering need.
    pub watering: Watering,
    /// Light need.
    pub sunlight: Sunlight,
    /// Temperature preference.
    pub temperature: Temperature,
    /// Short description.
    pub description: &'static str,
    /// Care tips.
    pub tips: &'static [&'static str],
}

impl PlantProfile {
    /// Build an identification of this plant with the given confidence.
    #[must_use]
    pub fn identification(&self, confidence: f32) -> Identification {
        Identification {
            name: self.name.to_owned(),
            species: self.species.to_owned(),
            confidence,
            care: CareInstructions {
                watering: self.watering,
                sunlight: self.sunlight,
                temperature: self.temperature,
                description: self.description.to_owned(),
                tips: self.tips.iter().map(|&tip| tip.to_owned()).collect(),
            },
        }
    }
}

/// Plants known to [`MockIdentifier`](crate::MockIdentifier).
pub const CATALOGUE: [PlantProfile; 5] = [
    PlantProfile {
        name: "Monstera Deliciosa",
        species: "Monstera deliciosa",
        base_confidence: 0.92,
        watering: Watering::Medium,
        sunlight: Sunlight::Partial,
        temperature: Temperature::Warm,
        description: "The Monstera Deliciosa, also known as the Swiss Cheese Plant, is known for its large, glossy, perforated leaves.",
        tips: &[
            "Water when the top 1-2 inches of soil are dry",
            "Prefers bright, indirect light",
            "Keep in temperatures between 65-85°F",
            "Enjoys high humidity but adapts to average home conditions",
            "Feed with a balanced fertilizer monthly during growing season",
        ],
    },
    PlantProfile {
        name: "Peace Lily",
        species: "Spathiphyllum wallisii",
        base_confidence: 0.89,
        watering: Watering::Medium,
        sunlight: Sunlight::Low,
        temperature: Temperature::Average,
        description: "Peace Lilies are elegant plants with glossy dark green leaves and beautiful white spathes.",
        tips: &[
            "Keep soil consistently moist but not soggy",
            "Thrives in low to moderate light conditions",
            "Prefers temperatures between 65-80°F",
            "Drooping leaves indicate it needs water",
            "Mist regularly to increase humidity",
        ],
    },
    PlantProfile {
        name: "Snake Plant",
        species: "Sansevieria trifasciata",
        base_confidence: 0.95,
        watering: Watering::Low,
        sunlight: Sunlight::Partial,
        temperature: Temperature::Average,
        description: "Snake Plants have tall, stiff, upright leaves with distinctive patterns, making them one of the most adaptable houseplants.",
        tips: &[
            "Allow soil to dry completely between waterings",
            "Tolerates low light but grows best in indirect bright light",
            "Thrives in normal room temperatures between 60-85°F",
            "Very drought tolerant - perfect for beginners",
            "Rarely needs repotting and prefers to be slightly root-bound",
        ],
    },
    PlantProfile {
        name: "Pothos",
        species: "Epipremnum aureum",
        base_confidence: 0.93,
        watering: Watering::Low,
        sunlight: Sunlight::Partial,
        temperature: Temperature::Average,
        description: "Pothos is a popular trailing plant with heart-shaped leaves, known for its air-purifying abilities and easy care.",
        tips: &[
            "Allow soil to dry out between waterings",
            "Adaptable to various light conditions from low to bright indirect light",
            "Thrives in normal room temperatures between 65-85°F",
            "Highly tolerant of neglect - perfect for beginners",
            "Prune occasionally to promote bushier growth",
        ],
    },
    PlantProfile {
        name: "Aloe Vera",
        species: "Aloe barbadensis miller",
        base_confidence: 0.91,
        watering: Watering::Low,
        sunlight: Sunlight::Full,
        temperature: Temperature::Warm,
        description: "Aloe Vera is a succulent plant known for its healing properties and distinctive fleshy, serrated leaves.",
        tips: &[
            "Water deeply but infrequently, allowing soil to dry completely between waterings",
            "Needs bright, direct sunlight to thrive",
            "Prefers warm temperatures between 70-85°F",
            "Use well-draining soil, such as a cactus mix",
            "Watch for brown, thin leaves which indicate overwatering",
        ],
    },
];
