//! Page templates, compiled into the binary.

use tera::Tera;

/// Build the template engine with every page registered.
pub fn engine() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("base.html", include_str!("../templates/base.html")),
        ("register.html", include_str!("../templates/register.html")),
        ("login.html", include_str!("../templates/login.html")),
    ])?;

    Ok(tera)
}
