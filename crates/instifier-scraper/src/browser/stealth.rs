//! Fingerprint script installed on every new document before site code runs.

/// Hides the automation flag and fills in the navigator surface a headless
/// browser leaves empty.
pub const INIT_SCRIPT: &str = r"
Object.defineProperty(navigator, 'webdriver', { get: () => false });
window.chrome = window.chrome || {};
window.chrome.runtime = window.chrome.runtime || {};
const originalQuery = window.navigator.permissions.query;
window.navigator.permissions.__proto__.query = (parameters) => (
  parameters.name === 'notifications'
    ? Promise.resolve({ state: Notification.permission })
    : originalQuery(parameters)
);
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
";

/// Extra launch flags that keep the automation banner and sandbox prompts away.
pub const LAUNCH_ARGS: [&str; 3] = [
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-blink-features=AutomationControlled",
];
