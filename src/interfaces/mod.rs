pub mod forecast_chart;
