//! SDK boundary for the native adapter.
//!
//! [`SimLink`] is the minimal surface the dispatch loop needs from
//! SimConnect: register one composite data definition, request user-aircraft
//! data, poll the next dispatch, close. The real implementation binds
//! `SimConnect.dll` and only exists on Windows; everywhere else the adapter
//! constructor reports the platform as unavailable. Tests drive the loop
//! with an in-memory link.
//!
//! Whichever implementation is used, every call happens on the adapter's
//! dedicated dispatch thread: the SDK is not reentrant and binds its handle
//! to the opening thread.

use thiserror::Error;

use super::record::FieldKind;

/// Errors from the SDK boundary.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Opening the SDK connection failed (simulator not running, DLL
    /// missing its pipe, ...).
    #[error("SimConnect open failed: {0}")]
    Open(String),

    /// A call after open returned a failure HRESULT.
    #[error("SimConnect {call} failed (HRESULT {code:#010X})")]
    Call { call: &'static str, code: i32 },
}

/// One dispatch poll result.
#[derive(Debug)]
pub enum Dispatch {
    /// Simobject data for our request: the raw packed record.
    Data(Vec<u8>),
    /// The server flagged an exception for an earlier call.
    Exception(u32),
    /// A message type the adapter does not handle.
    Other,
    /// Nothing queued right now; caller should back off briefly.
    Pending,
}

/// Minimal SimConnect surface used by the dispatch loop.
pub trait SimLink: Send {
    /// Append one field to the composite data definition.
    fn add_field(
        &mut self,
        define_id: u32,
        var: &str,
        unit: &str,
        kind: &FieldKind,
    ) -> Result<(), LinkError>;

    /// Request one data record for the user aircraft.
    fn request_data(&mut self, request_id: u32, define_id: u32) -> Result<(), LinkError>;

    /// Poll the next queued dispatch without blocking.
    fn next_dispatch(&mut self) -> Dispatch;

    /// Close the SDK connection. Best-effort.
    fn close(&mut self);
}

/// Factory invoked on the dispatch thread to open the SDK connection there.
pub type LinkFactory = dyn Fn() -> Result<Box<dyn SimLink>, LinkError> + Send + Sync;

#[cfg(windows)]
pub use windows::native_link_factory;

/// Raw bindings to `SimConnect.dll` and the [`SimLink`] implementation over
/// them.
#[cfg(windows)]
mod windows {
    use std::ffi::{c_void, CString};
    use std::ptr;
    use std::sync::Arc;

    use super::super::record::FieldKind;
    use super::{Dispatch, LinkError, LinkFactory, SimLink};

    type Handle = *mut c_void;
    type HResult = i32;

    const S_OK: HResult = 0;

    const DATATYPE_FLOAT64: u32 = 4;
    const DATATYPE_STRING256: u32 = 9;
    const SIMOBJECT_TYPE_USER: u32 = 0;
    const UNUSED: u32 = u32::MAX;

    const RECV_ID_EXCEPTION: u32 = 2;
    const RECV_ID_SIMOBJECT_DATA_BYTYPE: u32 = 8;

    #[repr(C)]
    struct Recv {
        size: u32,
        version: u32,
        id: u32,
    }

    #[repr(C)]
    struct RecvException {
        recv: Recv,
        exception: u32,
        send_id: u32,
        index: u32,
    }

    #[repr(C)]
    struct RecvSimobjectData {
        recv: Recv,
        request_id: u32,
        object_id: u32,
        define_id: u32,
        flags: u32,
        entry_number: u32,
        out_of: u32,
        define_count: u32,
        // Packed record data follows this header in-place.
    }

    #[link(name = "SimConnect")]
    extern "system" {
        fn SimConnect_Open(
            handle: *mut Handle,
            name: *const i8,
            hwnd: *mut c_void,
            user_event: u32,
            event_handle: *mut c_void,
            config_index: u32,
        ) -> HResult;
        fn SimConnect_Close(handle: Handle) -> HResult;
        fn SimConnect_AddToDataDefinition(
            handle: Handle,
            define_id: u32,
            datum_name: *const i8,
            units: *const i8,
            datum_type: u32,
            epsilon: f32,
            datum_id: u32,
        ) -> HResult;
        fn SimConnect_RequestDataOnSimObjectType(
            handle: Handle,
            request_id: u32,
            define_id: u32,
            radius_meters: u32,
            object_type: u32,
        ) -> HResult;
        fn SimConnect_GetNextDispatch(
            handle: Handle,
            data: *mut *mut Recv,
            size: *mut u32,
        ) -> HResult;
    }

    struct NativeLink {
        handle: Handle,
    }

    // The handle is only ever touched from the dispatch thread; Send is
    // required to move the freshly opened link into that thread's loop.
    unsafe impl Send for NativeLink {}

    impl NativeLink {
        fn open(app_name: &str) -> Result<Self, LinkError> {
            let name = CString::new(app_name).map_err(|e| LinkError::Open(e.to_string()))?;
            let mut handle: Handle = ptr::null_mut();
            let code = unsafe {
                SimConnect_Open(
                    &mut handle,
                    name.as_ptr(),
                    ptr::null_mut(),
                    0,
                    ptr::null_mut(),
                    0,
                )
            };
            if code != S_OK || handle.is_null() {
                return Err(LinkError::Open(format!("HRESULT {code:#010X}")));
            }
            Ok(Self { handle })
        }
    }

    impl SimLink for NativeLink {
        fn add_field(
            &mut self,
            define_id: u32,
            var: &str,
            unit: &str,
            kind: &FieldKind,
        ) -> Result<(), LinkError> {
            let name = CString::new(var).map_err(|e| LinkError::Open(e.to_string()))?;
            let unit_cstr;
            let (unit_ptr, datum_type) = match kind {
                FieldKind::Float64 => {
                    unit_cstr = CString::new(unit).map_err(|e| LinkError::Open(e.to_string()))?;
                    (unit_cstr.as_ptr(), DATATYPE_FLOAT64)
                }
                // String fields take no unit
                FieldKind::Bytes(_) => (ptr::null(), DATATYPE_STRING256),
            };
            let code = unsafe {
                SimConnect_AddToDataDefinition(
                    self.handle,
                    define_id,
                    name.as_ptr(),
                    unit_ptr,
                    datum_type,
                    0.0,
                    UNUSED,
                )
            };
            if code != S_OK {
                return Err(LinkError::Call {
                    call: "AddToDataDefinition",
                    code,
                });
            }
            Ok(())
        }

        fn request_data(&mut self, request_id: u32, define_id: u32) -> Result<(), LinkError> {
            let code = unsafe {
                SimConnect_RequestDataOnSimObjectType(
                    self.handle,
                    request_id,
                    define_id,
                    0,
                    SIMOBJECT_TYPE_USER,
                )
            };
            if code != S_OK {
                return Err(LinkError::Call {
                    call: "RequestDataOnSimObjectType",
                    code,
                });
            }
            Ok(())
        }

        fn next_dispatch(&mut self) -> Dispatch {
            let mut data: *mut Recv = ptr::null_mut();
            let mut size: u32 = 0;
            let code = unsafe { SimConnect_GetNextDispatch(self.handle, &mut data, &mut size) };
            // A failure HRESULT here means "nothing to read", not an error.
            if code != S_OK || data.is_null() {
                return Dispatch::Pending;
            }

            let id = unsafe { (*data).id };
            match id {
                RECV_ID_SIMOBJECT_DATA_BYTYPE => {
                    let header = std::mem::size_of::<RecvSimobjectData>();
                    let total = size as usize;
                    if total <= header {
                        return Dispatch::Other;
                    }
                    let record = unsafe {
                        std::slice::from_raw_parts(
                            (data as *const u8).add(header),
                            total - header,
                        )
                    };
                    Dispatch::Data(record.to_vec())
                }
                RECV_ID_EXCEPTION => {
                    let exception = unsafe { (*(data as *const RecvException)).exception };
                    Dispatch::Exception(exception)
                }
                _ => Dispatch::Other,
            }
        }

        fn close(&mut self) {
            if !self.handle.is_null() {
                unsafe { SimConnect_Close(self.handle) };
                self.handle = ptr::null_mut();
            }
        }
    }

    /// Factory for the real SDK link.
    pub fn native_link_factory(app_name: &'static str) -> Arc<LinkFactory> {
        Arc::new(move || Ok(Box::new(NativeLink::open(app_name)?) as Box<dyn SimLink>))
    }
}
