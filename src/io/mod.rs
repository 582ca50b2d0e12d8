//! 输入输出通道：控制台 / 语音识别输入，控制台 / TTS 输出

pub mod input;
pub mod output;

pub use input::{InputSource, LineInput, ScriptedInput};
pub use output::{CommandTts, ConsoleOutput, FanOutput, RecordingOutput, SpeechOutput};
