use crate::models::Notification;
use crate::routes::errors::AppError;
use actix_session::Session;

const NOTIFICATION_KEY: &str = "notification";

/// Leaves a message for the next page the management area renders.
pub fn notify(session: &Session, kind: &str, message: impl Into<String>) -> Result<(), AppError> {
    let notification = Notification { message: message.into(), r#type: kind.to_string() };
    session.insert(NOTIFICATION_KEY, notification)?;
    Ok(())
}

/// Takes the pending message, if any, so it is shown once.
pub fn take_notification(session: &Session) -> Option<Notification> {
    let notification = session.get::<Notification>(NOTIFICATION_KEY).ok().flatten();
    if notification.is_some() {
        session.remove(NOTIFICATION_KEY);
    }
    notification
}

/// Management-area view of an optional location.
pub fn location_label(name: Option<&str>) -> String {
    name.map(str::to_string).unwrap_or_else(|| "Planet Earth".to_string())
}
