//! UI element lookup capability
//!
//! The engine never touches game objects directly. A host provides a
//! [`Locator`] that finds on-screen elements by role and activates them;
//! [`LocatorSink`] turns farm actions into those activations.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

use crate::domain::QuestAction;
use crate::farm::{ActionOutcome, ActionSink, FarmAction};

/// What a UI element is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UiRole {
    /// Quest tracker entry; clicking it auto-paths
    QuestPanel,
    /// NPC name link in the quest tracker
    NpcLink,
    /// Continue/accept button of an NPC dialog
    DialogButton,
    SkillButton,
    /// Use button of the quest item
    ItemButton,
    MovementPad,
}

impl fmt::Display for UiRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::QuestPanel => "quest-panel",
            Self::NpcLink => "npc-link",
            Self::DialogButton => "dialog-button",
            Self::SkillButton => "skill-button",
            Self::ItemButton => "item-button",
            Self::MovementPad => "movement-pad",
        };
        write!(f, "{}", name)
    }
}

/// Element to activate for an action; `None` for passive actions
pub fn role_for(action: FarmAction) -> Option<UiRole> {
    match action {
        FarmAction::Perform(quest_action) => match quest_action {
            QuestAction::ClickQuestPanel => Some(UiRole::QuestPanel),
            QuestAction::PathfindAndTalkNpc => Some(UiRole::NpcLink),
            QuestAction::PressMovementKeys => Some(UiRole::MovementPad),
            QuestAction::PressSkillKey => Some(UiRole::SkillButton),
            QuestAction::ClickItem => Some(UiRole::ItemButton),
            QuestAction::None | QuestAction::WaitForKill | QuestAction::WaitForUser => None,
        },
        FarmAction::AdvanceDialog => Some(UiRole::DialogButton),
        FarmAction::RetryPathfind => Some(UiRole::QuestPanel),
    }
}

/// A located UI element
pub trait UiHandle {
    /// Fire the element's callback; false if it refused
    fn activate(&self) -> bool;
}

/// Finds UI elements by role
pub trait Locator {
    fn find_by_role(&self, role: UiRole) -> Option<Box<dyn UiHandle>>;
}

/// [`ActionSink`] backed by a [`Locator`]
pub struct LocatorSink<L: Locator> {
    locator: L,
}

impl<L: Locator> LocatorSink<L> {
    pub fn new(locator: L) -> Self {
        Self { locator }
    }

    pub fn locator(&self) -> &L {
        &self.locator
    }
}

impl<L: Locator> ActionSink for LocatorSink<L> {
    fn invoke(&mut self, action: FarmAction) -> ActionOutcome {
        let Some(role) = role_for(action) else {
            trace!(%action, "LocatorSink::invoke: passive action");
            return ActionOutcome::Performed;
        };

        match self.locator.find_by_role(role) {
            Some(handle) if handle.activate() => ActionOutcome::Performed,
            Some(_) => {
                debug!(%action, %role, "LocatorSink::invoke: activation refused");
                ActionOutcome::NotPerformed
            }
            None => {
                debug!(%action, %role, "LocatorSink::invoke: element not found");
                ActionOutcome::NotPerformed
            }
        }
    }
}
