use super::checkin_summary;
use crate::events::Event;
use crate::session::Session;
use crate::state_machine::Machine;

/// Probes `checkin/` and reports whether the stored session is usable.
/// Never touches the stored session.
pub(crate) async fn check(machine: &Machine) {
    match machine.client().checkin().await {
        Ok(counts) => {
            machine.status(format!("You are authenticated.\n\n{}", checkin_summary(&counts)));
            machine.emit(Event::Authenticated(true));
            machine.start_poller();
        }
        Err(e) if e.needs_auth() => {
            machine.status(machine.auth_guidance());
            machine.emit(Event::Authenticated(false));
        }
        Err(e) => {
            machine.error(format!("Unexpected response: {e}\n"));
            machine.emit(Event::Authenticated(false));
            machine.fail();
        }
    }
}

/// Logs out when the current session works, logs in otherwise.
pub(crate) async fn toggle(machine: &Machine, email: Option<String>, password: Option<String>) {
    if machine.client().checkin().await.is_ok() {
        logout(machine);
    } else {
        login(machine, email, password).await;
    }
}

fn logout(machine: &Machine) {
    machine.poller().stop();
    match machine.client().tokens().clear() {
        Ok(()) => {
            tracing::info!("session cleared");
            machine.status("You have been logged out.\n");
            machine.emit(Event::Authenticated(false));
        }
        Err(e) => {
            machine.error(format!("Logging out failed: {e}\n"));
            machine.fail();
        }
    }
}

async fn login(machine: &Machine, email: Option<String>, password: Option<String>) {
    let email = email.map(|e| e.trim().to_lowercase()).unwrap_or_default();
    let password = password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        machine.error("Email or password cannot be empty.\n");
        machine.fail();
        return;
    }

    let tokens = match machine.client().login(&email, &password).await {
        Ok(tokens) => tokens,
        Err(e) => {
            machine.error(format!("Authentication failed: {e}\n"));
            machine.emit(Event::Authenticated(false));
            machine.fail();
            return;
        }
    };

    let Some(session) = Session::new(tokens.access, tokens.refresh) else {
        machine.error("Authentication failed (access not found).\n");
        machine.emit(Event::Authenticated(false));
        machine.fail();
        return;
    };

    if let Err(e) = machine.client().tokens().save(&session) {
        machine.error(format!("Authentication failed: {e}\n"));
        machine.fail();
        return;
    }
    tracing::info!("session stored");

    match machine.client().checkin().await {
        Ok(counts) => machine.status(format!(
            "You are authenticated.\n\n{}",
            checkin_summary(&counts)
        )),
        Err(e) => machine.warning(format!("Cluster status unavailable: {e}\n")),
    }
    machine.emit(Event::Authenticated(true));
}
