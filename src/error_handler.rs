use tracing::error;

use crate::commands::CommandError;

/// Tells the person at the terminal what went wrong, and logs what they can't fix.
pub fn handle_error(error: CommandError) {
    match error {
        CommandError::User { message } => {
            reply_with_error(&message);
        }

        CommandError::Internal { message } => {
            reply_with_internal_error(&message);
            error!("Internal error: {}", message);
        }

        CommandError::Io(error) => {
            reply_with_internal_error(&error.to_string());
            error!("I/O error: {}", error);
        }

        CommandError::Prompt(error) => {
            reply_with_internal_error(&error.to_string());
            error!("Prompt failed: {}", error);
        }
    }
}

fn reply_with_error(error_message: &str) {
    eprintln!("{error_message}");
}

fn reply_with_internal_error(error_message: &str) {
    reply_with_error(&format!(
        "Sorry, there was an internal error while executing your command: {}",
        error_message
    ));
}
