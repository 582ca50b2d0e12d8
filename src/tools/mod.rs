pub mod command;
pub mod desktop;
pub mod executor;
pub mod help;
pub mod recall;
pub mod registry;
pub mod risk;
pub mod schema;
pub mod screen;
pub mod webcam;

pub use desktop::{
    ClickTool, DesktopAction, DesktopDriver, DryRunDriver, MoveMouseTool, TypeTextTool,
    XdotoolDriver,
};
pub use executor::ToolExecutor;
pub use help::HelpTool;
pub use recall::{MemoryStatsTool, RecallMemoryTool, RecentMemoriesTool};
pub use registry::{validate_args, Tool, ToolRegistry, ToolResult, ToolSpec};
pub use risk::RiskPolicy;
pub use schema::tool_call_schema_json;
pub use screen::{CommandScreenReader, ReadScreenTool, ScreenReader, StaticScreenReader};
pub use webcam::{summarize_frame, CommandWebcam, FrameSummary, WebcamCapture, WebcamTool};
