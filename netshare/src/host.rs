/// Actions the embedding application performs on the engine's behalf
pub trait HostActions: Send + Sync {
    /// Open the OS Wi-Fi settings screen. `false` if it could not be launched.
    fn open_wifi_settings(&self) -> bool;

    /// Launch the screen-capture permission prompt. `false` if no prompt could be shown.
    /// The user's answer arrives later through `SessionGateway::permission_result`.
    fn request_screen_capture(&self) -> bool;

    /// Bring the calling application back to the foreground
    fn bring_to_foreground(&self);

    /// Password of the currently connected network, when the host can read it directly
    fn wifi_password(&self) -> Option<String>;

    /// Toggle screenshot protection on the caller's own window
    fn set_secure_window(&self, enable: bool);
}
