use comfy_table::{Table, presets::UTF8_FULL};
use spherre_deploy::Registry;

/// Render the registry as a table: contract, address, class hash.
pub fn registry_table(registry: &Registry) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Contract", "Address", "Class hash"]);

    for artifact in registry.iter() {
        table.add_row(vec![
            artifact.name.clone(),
            artifact.address.to_string(),
            artifact.class_identifier.to_string(),
        ]);
    }

    table
}
