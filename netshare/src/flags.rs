use serde::Serialize;

/// Idempotence guards for one logical connectivity flow.
///
/// Each guard is only cleared by an explicit flow start, flow end, or reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionFlags {
    pub settings_launched: bool,
    pub a11y_started: bool,
    pub waiting_for_permission: bool,
    pub flow_active: bool,
}

impl SessionFlags {
    /// Clear the launch guards. `flow_active` is owned by flow start/end.
    pub fn reset(&mut self) {
        self.settings_launched = false;
        self.a11y_started = false;
        self.waiting_for_permission = false;
    }

    pub fn begin_flow(&mut self) {
        self.reset();
        self.flow_active = true;
    }

    pub fn end_flow(&mut self) {
        self.reset();
        self.flow_active = false;
    }

    /// Mark the settings screen as launched; `false` if it already was
    pub fn try_launch_settings(&mut self) -> bool {
        !std::mem::replace(&mut self.settings_launched, true)
    }
}
