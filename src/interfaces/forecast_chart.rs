use crate::application::ml::forecaster::ChartData;
use crate::application::pipeline::ForecastReport;
use egui_plot::{Legend, Line, Plot, PlotPoints};

const ACTUAL_COLOR: egui::Color32 = egui::Color32::from_rgb(30, 120, 220);
const PREDICTED_COLOR: egui::Color32 = egui::Color32::from_rgb(220, 60, 60);

/// Window showing actual vs predicted prices for the latest test examples.
pub struct ForecastChartApp {
    chart: ChartData,
    caption: String,
}

impl ForecastChartApp {
    pub fn new(chart: ChartData, caption: String) -> Self {
        Self { chart, caption }
    }

    pub fn from_report(report: &ForecastReport) -> Self {
        let m = &report.evaluation.metrics;
        let mut caption = format!("RMSE {:.3}   MAE {:.3}   R2 {:.3}", m.rmse, m.mae, m.r2);
        if let Some(price) = report.next_price {
            caption.push_str(&format!(
                "   Next ({}d): {:.2}",
                report.lookup_step, price
            ));
        }
        Self::new(report.evaluation.chart.clone(), caption)
    }
}

impl eframe::App for ForecastChartApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("forecast_header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(&self.chart.title);
                ui.separator();
                ui.label(&self.caption);
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.chart.is_empty() {
                ui.centered_and_justified(|ui| {
                    ui.label(egui::RichText::new("No test examples to plot.").italics());
                });
                return;
            }

            let actual = Line::new("Actual Price", PlotPoints::from(self.chart.actual_points()))
                .color(ACTUAL_COLOR)
                .width(1.5);
            let predicted =
                Line::new("Predicted Price", PlotPoints::from(self.chart.predicted_points()))
                    .color(PREDICTED_COLOR)
                    .width(1.5);

            Plot::new("forecast_plot")
                .legend(Legend::default())
                .x_axis_label("Days")
                .y_axis_label("Price")
                .show_axes([true, true])
                .show_grid([true, true])
                .show(ui, |plot_ui| {
                    plot_ui.line(actual);
                    plot_ui.line(predicted);
                });
        });
    }
}

/// Opens the chart window and blocks until it is closed.
pub fn show_chart(app: ForecastChartApp) -> anyhow::Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 600.0])
            .with_title("Pricecast"),
        ..Default::default()
    };

    eframe::run_native(
        "Pricecast",
        native_options,
        Box::new(|_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow::anyhow!("Eframe error: {}", e))?;

    Ok(())
}
