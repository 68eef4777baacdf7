use crate::core::config::{path_display, Config};
use crate::core::persona::PersonaCatalog;

pub fn list_personas(catalog: &PersonaCatalog) {
    print!("{}", render_persona_list(catalog));

    if let Ok(path) = Config::get_config_path() {
        println!();
        println!("💡 Define more personas as [personas.<id>] tables in {}", path_display(&path));
        println!("   Start one with: personachat --persona <id>");
    }
}

pub(crate) fn render_persona_list(catalog: &PersonaCatalog) -> String {
    let mut content = String::from("Available personas:\n\n");

    for stored in catalog.list() {
        let marker = if stored.id.eq_ignore_ascii_case(catalog.default_id()) {
            "*"
        } else {
            " "
        };
        content.push_str(&format!(
            "  {marker} {:<12} {} ({})\n",
            stored.id,
            stored.persona.display_label(),
            stored.persona.effective_model()
        ));
        let description = stored.persona.description.trim();
        if !description.is_empty() {
            content.push_str(&format!("      {description}\n"));
        }
    }

    content.push_str("\n* = default persona\n");
    content
}
