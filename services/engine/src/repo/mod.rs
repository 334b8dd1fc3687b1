pub mod answer;
pub mod event_log;
pub mod participant;
pub mod presence;
pub mod quiz;
pub mod question;

pub use event_log::EventLogRow;
pub use participant::ParticipantRow;
pub use question::{OptionRow, QuestionRow};
pub use quiz::QuizRow;
