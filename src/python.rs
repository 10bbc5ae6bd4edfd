//! Python bindings.

use pyo3::exceptions::{PyConnectionError, PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;

use crate::config::{BridgeConfig, DEFAULT_PRODUCT_ID, DEFAULT_VENDOR_ID};
use crate::errors::BridgeError;
use crate::logging;
use crate::session::Mcp2221;
use crate::transport::HidapiTransport;

fn to_py_err(err: BridgeError) -> PyErr {
    match err {
        BridgeError::AdapterNotFound { .. } => PyConnectionError::new_err(err.to_string()),
        BridgeError::InvalidAddress(_) | BridgeError::TransferTooLong { .. } => {
            PyValueError::new_err(err.to_string())
        }
        BridgeError::Transport(_) => PyIOError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

/// MCP2221 USB-HID to I2C bridge bound to one node address.
///
/// Example:
///     >>> bridge = MCP2221(0x18)
///     >>> raw = bridge.write_and_read(b"\x05", 2)
///
/// Raises:
///     ConnectionError: If no bridge with the given VID/PID is attached.
///     ValueError: If the address is not a 7-bit address.
#[pyclass(name = "MCP2221", unsendable)]
struct PyMcp2221 {
    inner: Mcp2221<HidapiTransport>,
}

#[pymethods]
impl PyMcp2221 {
    /// Open the bridge and bind it to `address`.
    ///
    /// Settings start from the `MCP2221_*` environment variables; keyword
    /// arguments override them.
    ///
    /// Args:
    ///     address: 7-bit I2C node address.
    ///     vid: USB vendor ID (default: MCP2221_VID or 0x04D8).
    ///     pid: USB product ID (default: MCP2221_PID or 0x00DD).
    ///     max_polls: Ceiling on GetData polls per read (default: MCP2221_MAX_POLLS or none).
    #[new]
    #[pyo3(signature = (address, vid=None, pid=None, max_polls=None))]
    fn new(
        address: u8,
        vid: Option<u16>,
        pid: Option<u16>,
        max_polls: Option<u32>,
    ) -> PyResult<Self> {
        let config = BridgeConfig::from_env().overlay(vid, pid, max_polls);
        Mcp2221::open(address, config)
            .map(|inner| PyMcp2221 { inner })
            .map_err(to_py_err)
    }

    /// Write bytes to the node, ending with a stop condition.
    fn write(&mut self, data: &[u8]) -> PyResult<()> {
        self.inner.write(data).map_err(to_py_err)
    }

    /// Read `count` bytes from the node.
    fn read<'py>(&mut self, py: Python<'py>, count: usize) -> PyResult<Bound<'py, PyBytes>> {
        let data = self.inner.read(count).map_err(to_py_err)?;
        Ok(PyBytes::new(py, &data))
    }

    /// Write `send_from`, then read `receive_count` bytes after a repeated start.
    fn write_and_read<'py>(
        &mut self,
        py: Python<'py>,
        send_from: &[u8],
        receive_count: usize,
    ) -> PyResult<Bound<'py, PyBytes>> {
        let data = self
            .inner
            .write_and_read(send_from, receive_count)
            .map_err(to_py_err)?;
        Ok(PyBytes::new(py, &data))
    }

    /// Cancel any transfer in progress. Returns True if the chip reported a
    /// transfer was cancelled.
    fn reset(&mut self) -> PyResult<bool> {
        self.inner
            .reset()
            .map(|outcome| outcome == crate::transfer::CancelOutcome::Cancelled)
            .map_err(to_py_err)
    }

    fn supports_clock_stretching(&self) -> bool {
        self.inner.supports_clock_stretching()
    }

    #[getter]
    fn address(&self) -> u8 {
        self.inner.address().value()
    }

    fn __repr__(&self) -> String {
        format!("MCP2221(address={:#04x})", self.inner.address().value())
    }
}

/// Set the level of Rust log records forwarded to Python's `logging`.
#[pyfunction]
#[pyo3(signature = (level=None))]
fn set_log_level(py: Python<'_>, level: Option<&str>) -> PyResult<()> {
    logging::set_python_log_level_str(py, level)
}

/// The Python module definition
#[pymodule]
fn mcp2221_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    logging::init_python_logging(m.py())?;

    m.add_class::<PyMcp2221>()?;
    m.add_function(wrap_pyfunction!(set_log_level, m)?)?;

    m.add("DEFAULT_VENDOR_ID", DEFAULT_VENDOR_ID)?;
    m.add("DEFAULT_PRODUCT_ID", DEFAULT_PRODUCT_ID)?;

    Ok(())
}
