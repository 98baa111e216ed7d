//! Browser fingerprint patching — hide automation signals.

/// JavaScript applied to each document before the harvester touches it.
/// Patches the handful of signals bot detectors probe first.
pub const FINGERPRINT_PATCH: &str = r#"
(() => {
    // Hide webdriver flag
    Object.defineProperty(navigator, 'webdriver', {
        get: () => false,
        configurable: true,
    });

    // Patch chrome.runtime to look like a real browser
    if (!window.chrome) {
        window.chrome = {};
    }
    if (!window.chrome.runtime) {
        window.chrome.runtime = {
            connect: function() {},
            sendMessage: function() {},
        };
    }

    // Override permissions query to hide the "notifications" prompt
    const originalQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (parameters) =>
        parameters.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : originalQuery(parameters);

    // Patch plugins to appear non-empty
    Object.defineProperty(navigator, 'plugins', {
        get: () => [1, 2, 3, 4, 5],
        configurable: true,
    });

    // Match the locale the catalog serves
    Object.defineProperty(navigator, 'languages', {
        get: () => ['tr-TR', 'tr', 'en-US', 'en'],
        configurable: true,
    });
})();
"#;
