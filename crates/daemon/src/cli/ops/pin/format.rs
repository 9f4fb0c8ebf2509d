use time::format_description::well_known::Rfc3339;

use common::pins::PinStatusResponse;

pub fn pin_line(pin: &PinStatusResponse) -> String {
    let name = pin.pin.name.as_deref().unwrap_or("");
    format!("{}  {:<7}  {}  {}", pin.requestid, pin.status, pin.pin.cid, name)
}

pub fn pin_details(pin: &PinStatusResponse) -> String {
    let mut lines = vec![
        format!("requestid: {}", pin.requestid),
        format!("status:    {}", pin.status),
        format!("cid:       {}", pin.pin.cid),
    ];
    if let Some(name) = &pin.pin.name {
        lines.push(format!("name:      {}", name));
    }
    lines.push(format!(
        "created:   {}",
        pin.created
            .format(&Rfc3339)
            .unwrap_or_else(|_| pin.created.to_string())
    ));
    if let Some(size) = pin.info.as_ref().and_then(|info| info.size_bytes) {
        lines.push(format!("size:      {} bytes", size));
    }
    for origin in &pin.pin.origins {
        lines.push(format!("origin:    {}", origin));
    }
    for (key, value) in &pin.pin.meta {
        lines.push(format!("meta:      {}={}", key, value));
    }
    lines.join("\n")
}
