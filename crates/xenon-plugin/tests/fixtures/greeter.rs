//! Plugin library built and loaded by the dynamic loading tests.

use xenon_plugin::prelude::*;

fn greet(builder: &mut PluginBuilder<'_>) -> AppResult<()> {
    builder.hook(Priority::High, |greetings: &mut Vec<String>| {
        greetings.push("hello from greeter".to_string());
        false
    })
}

entry_point!(greet);
