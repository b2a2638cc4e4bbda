use async_trait::async_trait;

use super::StoryGenerator;
use crate::errors::GenerationError;
use crate::story::{DraftNode, StoryDraft, StoryOption};

const SETTINGS: [&str; 4] = [
    "under a bruised violet sky",
    "at the edge of a forgotten map",
    "in the hush before a storm",
    "where the old roads meet",
];

const COMPANIONS: [&str; 4] = [
    "a one-eyed cartographer",
    "a talking lantern",
    "a retired smuggler",
    "a child who never blinks",
];

/// Offline generator producing a fixed-shape branching story seeded by the theme.
///
/// Shape: root with two branches and a walk-away choice; each branch ends in a
/// mix of winning and losing endings, one branch going a level deeper.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateStoryGenerator;

impl TemplateStoryGenerator {
    pub fn build(theme: &str) -> StoryDraft {
        let theme = theme.trim();
        let seed = theme.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        let setting = SETTINGS[seed % SETTINGS.len()];
        let companion = COMPANIONS[(seed / SETTINGS.len()) % COMPANIONS.len()];

        let mut draft = StoryDraft::new(
            format!("The {} Chronicle", title_case(theme)),
            DraftNode::passage(format!(
                "Your {} adventure begins {}. Two paths lie ahead: one lit by distant lights, \
                 one swallowed by shadow.",
                theme, setting
            )),
        );
        let root = draft.root;

        let lights = draft.add_node(DraftNode::passage(format!(
            "The lights belong to a camp. Beside the fire sits {}, who offers to guide you.",
            companion
        )));
        let shadow = draft.add_node(DraftNode::passage(
            "The shadowed path ends at a door carved with a riddle about the thing you fear most.",
        ));
        let riddle = draft.add_node(DraftNode::passage(
            "Behind the door a voice asks the riddle aloud and waits, patient as stone.",
        ));

        let guided_win = draft.add_node(DraftNode::ending(
            format!(
                "With {} at your side you reach the heart of the {} and claim what you came for.",
                companion, theme
            ),
            true,
        ));
        let alone_loss = draft.add_node(DraftNode::ending(
            "Alone, you wander until the path folds back on itself. The adventure is over.",
            false,
        ));
        let riddle_win = draft.add_node(DraftNode::ending(
            "You answer truthfully. The door opens onto the treasure and the way home.",
            true,
        ));
        let riddle_loss = draft.add_node(DraftNode::ending(
            "You force the door. It holds, and the shadows close in behind you.",
            false,
        ));

        draft.add_option(root, StoryOption::continue_to("Follow the lights", lights));
        draft.add_option(root, StoryOption::continue_to("Take the shadowed path", shadow));
        draft.add_option(root, StoryOption::terminal("Turn back and go home"));

        draft.add_option(lights, StoryOption::continue_to("Accept the guide", guided_win));
        draft.add_option(lights, StoryOption::continue_to("Go on alone", alone_loss));

        draft.add_option(shadow, StoryOption::continue_to("Knock on the door", riddle));
        draft.add_option(shadow, StoryOption::continue_to("Break the door down", riddle_loss));

        draft.add_option(riddle, StoryOption::continue_to("Answer honestly", riddle_win));
        draft.add_option(riddle, StoryOption::continue_to("Refuse to answer", riddle_loss));

        draft
    }
}

#[async_trait]
impl StoryGenerator for TemplateStoryGenerator {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(&self, theme: &str) -> Result<StoryDraft, GenerationError> {
        Ok(Self::build(theme))
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
