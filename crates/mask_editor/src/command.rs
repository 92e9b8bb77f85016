use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr, VariantNames};
use ts_rs::TS;

use crate::{codec::MaskBytes, types::Point};

/// User input accepted by an editing session, one variant per control.
#[derive(
    Debug, Clone,
    Serialize, Deserialize, JsonSchema, TS,
    Display, EnumIter, VariantNames, IntoStaticStr,
    PartialEq
)]
#[serde(tag = "type", content = "params")]
#[strum(serialize_all = "snake_case")]
#[ts(export)]
pub enum EditorCommand {
    /// Start a stroke at surface-local coordinates
    #[serde(rename = "pointer_down")]
    PointerDown { x: f32, y: f32 },

    /// Extend the active stroke
    #[serde(rename = "pointer_move")]
    PointerMove { x: f32, y: f32 },

    /// Finish the active stroke and record it
    #[serde(rename = "pointer_up")]
    PointerUp,

    /// Change the brush width for subsequent strokes
    #[serde(rename = "set_brush_width")]
    SetBrushWidth {
        #[schemars(range(min = 1, max = 20))]
        width: u32,
    },

    #[serde(rename = "undo")]
    Undo,

    #[serde(rename = "redo")]
    Redo,

    /// Re-composite the base image, discarding painted strokes
    #[serde(rename = "clear_mask")]
    ClearMask,

    /// Encode the current surface as a PNG mask
    #[serde(rename = "export_mask")]
    ExportMask,
}

impl EditorCommand {
    /// Get the JSON schema for all commands
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(EditorCommand)
    }

    /// Get a list of all available command names
    pub fn command_names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::PointerDown { .. } => "Begin a stroke at the given point",
            Self::PointerMove { .. } => "Draw a segment from the last point to the given point",
            Self::PointerUp => "End the stroke and record it in history",
            Self::SetBrushWidth { .. } => "Set the brush width used by the next stroke",
            Self::Undo => "Restore the previous snapshot",
            Self::Redo => "Restore the next snapshot",
            Self::ClearMask => "Reload the base image and record it in history",
            Self::ExportMask => "Encode the current canvas as mask.png",
        }
    }

    /// Commands that draw one stroke through `points`.
    pub fn stroke<I, P>(points: I) -> Vec<EditorCommand>
    where
        I: IntoIterator<Item = P>,
        P: Into<Point>,
    {
        let mut commands = Vec::new();
        for (i, point) in points.into_iter().enumerate() {
            let Point { x, y } = point.into();
            commands.push(if i == 0 {
                Self::PointerDown { x, y }
            } else {
                Self::PointerMove { x, y }
            });
        }
        if !commands.is_empty() {
            commands.push(Self::PointerUp);
        }
        commands
    }
}

/// What a command did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The surface, history or brush changed.
    Applied,
    /// Nothing to do, e.g. undo at the first snapshot or a move while idle.
    Ignored,
    Exported(MaskBytes),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_tagged_json() {
        let json = serde_json::to_string(&EditorCommand::PointerDown { x: 1.0, y: 2.5 }).expect("serialize");
        assert_eq!(json, r#"{"type":"pointer_down","params":{"x":1.0,"y":2.5}}"#);

        let parsed: EditorCommand = serde_json::from_str(r#"{"type":"undo"}"#).expect("deserialize");
        assert_eq!(parsed, EditorCommand::Undo);
    }

    #[test]
    fn names_are_snake_case() {
        assert!(EditorCommand::command_names().contains(&"set_brush_width"));
        assert_eq!(EditorCommand::ClearMask.to_string(), "clear_mask");
    }

    #[test]
    fn stroke_brackets_points_with_down_and_up() {
        let commands = EditorCommand::stroke([[0.0, 0.0], [5.0, 5.0]]);
        assert_eq!(
            commands,
            vec![
                EditorCommand::PointerDown { x: 0.0, y: 0.0 },
                EditorCommand::PointerMove { x: 5.0, y: 5.0 },
                EditorCommand::PointerUp,
            ]
        );
        assert!(EditorCommand::stroke(Vec::<[f32; 2]>::new()).is_empty());
    }
}
