use std::time::Duration;

use eframe::{egui, Frame};
use egui::Context;

use reqwest::blocking::Client;
use reqwest::Result;
use serde::Deserialize;

const API: &str = "http://127.0.0.1:5000";

/// Verdict as returned by `/v1/verify`.
#[derive(Debug, Deserialize)]
struct Verdict {
    sentence: String,
    correct: bool,
    violations: Vec<String>,
}

impl Verdict {
    fn describe(&self) -> String {
        if self.correct {
            format!("✓ Correct — {}", self.sentence)
        } else {
            format!("✖ Incorrect — {}\n{}", self.sentence, self.violations.join(", "))
        }
    }
}

/// REST context holding a reusable blocking HTTP client.
struct RESTContext {
    client: Client,
}

impl RESTContext {
    /// Creates a new REST context with a timeout.
    fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::new(5, 0))
            .build()?;
        Ok(Self { client })
    }

    /// Sends a GET request to `/v1/verify`, returns the raw JSON verdict.
    fn get_verify(&self, sentence: &str) -> Result<String> {
        let response = self.client
            .get(format!("{API}/v1/verify"))
            .query(&[("sentence", sentence)])
            .send()?
            .error_for_status()?;

        response.text()
    }

    /// Sends a GET request to `/v1/generate` with query parameters.
    fn get_generated(&self, template: &str, limit: usize) -> Result<String> {
        let response = self.client
            .get(format!("{API}/v1/generate"))
            .query(&[("template", template.to_owned()), ("limit", limit.to_string())])
            .send()?
            .error_for_status()?;

        response.text()
    }

    /// Sends a GET request to `/v1/templates`.
    fn get_templates(&self) -> Result<String> {
        let response = self.client
            .get(format!("{API}/v1/templates"))
            .send()?
            .error_for_status()?;

        response.text()
    }
}

/// Global UI state (MUST persist between frames in egui).
struct AccordUI {
    rest: RESTContext,
    output: Option<String>,

    sentence: String,

    selected_template: String,
    available_templates: Vec<String>,
    limit: usize,
}

impl AccordUI {
    /// Initializes the UI and fetches the template list.
    fn new() -> Result<Self> {
        let mut ui = Self {
            rest: RESTContext::new()?,
            output: None,
            sentence: String::new(),
            selected_template: "SN".to_owned(),
            available_templates: Vec::new(),
            limit: 10,
        };
        ui.get_templates();
        Ok(ui)
    }

    /// Performs the verification request.
    fn verify(&mut self) {
        let output = match self.rest.get_verify(&self.sentence) {
            Ok(json) => match serde_json::from_str::<Verdict>(&json) {
                Ok(verdict) => verdict.describe(),
                Err(e) => format!("Error: invalid verdict ({e})"),
            },
            Err(e) => format!("Error: {e}"),
        };
        self.output = Some(output);
    }

    /// Performs the generation request.
    fn generate(&mut self) {
        match self.rest.get_generated(&self.selected_template, self.limit) {
            Ok(sentences) if sentences.is_empty() => self.output = Some("No sentence generated".to_owned()),
            Ok(sentences) => self.output = Some(sentences),
            Err(e) => self.output = Some(format!("Error: {e}")),
        }
    }

    /// Performs the get templates request.
    fn get_templates(&mut self) {
        match self.rest.get_templates() {
            Ok(names) => {
                self.available_templates = names
                    .split('\n')
                    .map(|s| s.trim().to_owned())
                    .filter(|s| !s.is_empty())
                    .collect()
            }
            Err(e) => self.output = Some(format!("Error: {e}")),
        }
    }
}

impl eframe::App for AccordUI {
    /// UI update loop (called every frame).
    fn update(&mut self, ctx: &Context, _: &mut Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Grid::new("accord_grid")
                .num_columns(2)
                .spacing([20.0, 6.0])
                .striped(true)
                .show(ui, |ui| {
                    // sentence to verify
                    ui.label("Sentence");
                    ui.text_edit_singleline(&mut self.sentence);
                    ui.end_row();

                    ui.label("");
                    if ui.add_sized([200.0, 30.0], egui::Button::new("Verify")).clicked() {
                        self.verify();
                    }
                    ui.end_row();

                    ui.separator();
                    ui.end_row();

                    // template selection
                    ui.label("Template");
                    egui::ComboBox::from_id_salt("template")
                        .selected_text(self.selected_template.as_str())
                        .show_ui(ui, |ui| {
                            for template in &self.available_templates {
                                ui.selectable_value(&mut self.selected_template, template.clone(), template.as_str());
                            }
                        });
                    ui.end_row();

                    ui.label("Sentences");
                    ui.add(
                        egui::DragValue::new(&mut self.limit)
                            .range(1..=100)
                            .speed(1),
                    );
                    ui.end_row();

                    ui.label("");
                    if ui.add_sized([200.0, 30.0], egui::Button::new("Generate")).clicked() {
                        self.generate();
                    }
                    ui.end_row();
                });

            ui.separator();

            egui::ScrollArea::vertical().show(ui, |ui| match &self.output {
                Some(text) => ui.label(text),
                None => ui.label("Verify a sentence or generate from a template"),
            });
        });
    }
}

/// Application entry point.
fn main() -> eframe::Result {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([480.0, 420.0])
            .with_resizable(true),
        ..Default::default()
    };

    eframe::run_native(
        "accord",
        options,
        Box::new(|_| Ok(Box::new(AccordUI::new()?))),
    )
}
