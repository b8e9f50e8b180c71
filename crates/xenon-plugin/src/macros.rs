//! Convenience macros for plugin development.

/// Exports a function as the plugin's entry point.
///
/// The function must have the [`EntryPoint`](crate::loader::EntryPoint)
/// signature. The macro exports it under
/// [`ENTRY_SYMBOL`](crate::loader::ENTRY_SYMBOL) so the dynamic loader can
/// find it. Use it once per plugin library.
///
/// # Example
/// ```rust,ignore
/// use xenon_plugin::prelude::*;
///
/// fn main(builder: &mut PluginBuilder<'_>) -> AppResult<()> {
///     builder.hook(Priority::High, |state: &mut StartupState| {
///         state.messages.push("hello".into());
///         false
///     })
/// }
///
/// entry_point!(main);
/// ```
#[macro_export]
macro_rules! entry_point {
    ($main:path) => {
        #[unsafe(no_mangle)]
        pub fn xenon_plugin_main(
            builder: &mut $crate::PluginBuilder<'_>,
        ) -> $crate::AppResult<()> {
            let main: $crate::EntryPoint = $main;
            main(builder)
        }
    };
}
