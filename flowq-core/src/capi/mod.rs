//! C-ABI surface.
//!
//! Three function families mirror the three interfaces: `connect_*`,
//! `queuelist_*` and `queue_*`. Objects live in the process-wide handle
//! registry and are addressed by opaque `(index, generation)` handles;
//! every operation returns a one-byte status (see [`crate::error`]).
//! String, array and task outputs are allocated buffers whose ownership
//! transfers to the caller, paired with a companion destroy function.
//!
//! The C layer drives the async library through a lazily created
//! process-wide runtime and serialises registry access behind a mutex, so
//! callers must not invoke it from inside another tokio runtime.

mod logging;

pub use logging::{capi_init, LogCallback};

use std::ffi::{c_char, CStr, CString};
use std::ptr;
use std::sync::{Arc, Mutex, OnceLock};

use tokio::runtime::Runtime;
use tracing::error;

use crate::backend::local::LocalConnect;
use crate::backend::remote::RemoteConnect;
use crate::backend::{Connect, Queue, QueueList};
use crate::error::{Error, Result, STATUS_INVALID_ARGUMENT, STATUS_OK, STATUS_OS_ERROR};
use crate::registry::{Handle, ObjectKind, Registry, RegistryObject};
use crate::task::Task;

/// Backend tags accepted by [`connect_init`].
pub const BACKEND_LOCAL: u8 = 0;
pub const BACKEND_REMOTE: u8 = 1;

/// A task crossing the C boundary. Pointer fields of outputs are allocated
/// by the library and released by [`queue_task_destroy`].
#[repr(C)]
pub struct CTask {
    pub id: i32,
    pub exec_name: *mut c_char,
    pub argc: usize,
    pub argv: *mut *mut c_char,
    pub work_dir: *mut c_char,
    pub exit_code: i32,
    pub is_success: u8,
}

/// One output chunk: raw bytes, not NUL-terminated.
#[repr(C)]
pub struct CChunk {
    pub data: *mut u8,
    pub len: usize,
}

fn registry() -> &'static Mutex<Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Registry::new()))
}

fn runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("failed to build the capi runtime")
    })
}

fn with_registry<T>(f: impl FnOnce(&mut Registry) -> T) -> T {
    f(&mut registry().lock().expect("registry lock poisoned"))
}

fn get_connect(handle: Handle) -> Result<Arc<dyn Connect>> {
    with_registry(|r| r.connect(handle))
        .ok_or_else(|| Error::invalid("handle is not a live connection"))
}

fn get_queue_list(handle: Handle) -> Result<Arc<dyn QueueList>> {
    with_registry(|r| r.queue_list(handle))
        .ok_or_else(|| Error::invalid("handle is not a live queue list"))
}

fn get_queue(handle: Handle) -> Result<Arc<dyn Queue>> {
    with_registry(|r| r.queue(handle)).ok_or_else(|| Error::invalid("handle is not a live queue"))
}

unsafe fn cstr_arg<'a>(ptr: *const c_char) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(Error::invalid("string argument is null"));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| Error::invalid("string argument is not valid UTF-8"))
}

fn alloc_c_string(s: &str) -> Option<*mut c_char> {
    CString::new(s).ok().map(CString::into_raw)
}

fn into_raw_array<T>(values: Vec<T>) -> *mut T {
    let mut boxed = values.into_boxed_slice();
    let ptr = boxed.as_mut_ptr();
    std::mem::forget(boxed);
    ptr
}

unsafe fn from_raw_array<T>(ptr: *mut T, len: usize) -> Box<[T]> {
    Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len))
}

fn status_of(result: Result<()>) -> u8 {
    match result {
        Ok(()) => STATUS_OK,
        Err(err) => {
            error!(%err, "capi operation failed");
            err.status()
        }
    }
}

unsafe fn task_to_c(task: &Task, out: *mut CTask) -> u8 {
    if out.is_null() {
        return STATUS_INVALID_ARGUMENT;
    }
    *out = CTask {
        id: task.id,
        exec_name: ptr::null_mut(),
        argc: 0,
        argv: ptr::null_mut(),
        work_dir: ptr::null_mut(),
        exit_code: task.exit_code,
        is_success: task.is_success as u8,
    };

    let Some(exec_name) = alloc_c_string(&task.exec_name) else {
        return STATUS_OS_ERROR;
    };
    (*out).exec_name = exec_name;

    if !task.args.is_empty() {
        let mut argv: Vec<*mut c_char> = Vec::with_capacity(task.args.len());
        for arg in &task.args {
            match alloc_c_string(arg) {
                Some(p) => argv.push(p),
                None => {
                    for p in argv {
                        drop(CString::from_raw(p));
                    }
                    queue_task_destroy(out);
                    return STATUS_OS_ERROR;
                }
            }
        }
        (*out).argc = argv.len();
        (*out).argv = into_raw_array(argv);
    }

    // An empty working directory stays a null pointer.
    if !task.work_dir.is_empty() {
        match alloc_c_string(&task.work_dir) {
            Some(p) => (*out).work_dir = p,
            None => {
                queue_task_destroy(out);
                return STATUS_OS_ERROR;
            }
        }
    }

    STATUS_OK
}

unsafe fn task_from_c(input: *const CTask) -> Result<Task> {
    if input.is_null() {
        return Err(Error::invalid("task is null"));
    }
    let input = &*input;
    if input.exec_name.is_null() {
        return Err(Error::invalid("task executable is null"));
    }

    let mut args = Vec::with_capacity(input.argc);
    if input.argc > 0 {
        if input.argv.is_null() {
            return Err(Error::invalid("task argv is null"));
        }
        for i in 0..input.argc {
            let arg = *input.argv.add(i);
            if arg.is_null() {
                return Err(Error::invalid("task argument is null"));
            }
            args.push(cstr_arg(arg)?.to_string());
        }
    }

    let work_dir = if input.work_dir.is_null() {
        String::new()
    } else {
        cstr_arg(input.work_dir)?.to_string()
    };

    Ok(Task {
        id: input.id,
        exec_name: cstr_arg(input.exec_name)?.to_string(),
        args,
        work_dir,
        exit_code: input.exit_code,
        is_success: input.is_success != 0,
    })
}

// ---------------------------------------------------------------------------
// connect_*
// ---------------------------------------------------------------------------

/// Create an unbound connection for `backend` (0 local, 1 remote). `out`
/// must hold an invalid handle; a still-live handle is refused.
#[no_mangle]
pub unsafe extern "C" fn connect_init(backend: u8, out: *mut Handle) -> u8 {
    if out.is_null() {
        return STATUS_INVALID_ARGUMENT;
    }
    let object = match backend {
        BACKEND_LOCAL => RegistryObject::Connect(Arc::new(LocalConnect::new())),
        BACKEND_REMOTE => RegistryObject::Connect(Arc::new(RemoteConnect::new())),
        _ => return STATUS_INVALID_ARGUMENT,
    };

    let mut registry = registry().lock().expect("registry lock poisoned");
    if registry.is_valid(*out) {
        return STATUS_INVALID_ARGUMENT;
    }
    *out = registry.create(object);
    STATUS_OK
}

#[no_mangle]
pub unsafe extern "C" fn connect_destroy(handle: Handle) -> u8 {
    with_registry(|registry| {
        if registry.kind(handle) != Some(ObjectKind::Connect) {
            return STATUS_INVALID_ARGUMENT;
        }
        registry.remove(handle);
        STATUS_OK
    })
}

/// Bind the connection: data directory for local, `target:port` for remote.
#[no_mangle]
pub unsafe extern "C" fn connect_start_connect(
    handle: Handle,
    target: *const c_char,
    port: u16,
) -> u8 {
    let target = match cstr_arg(target) {
        Ok(target) => target,
        Err(err) => return err.status(),
    };
    let result = get_connect(handle)
        .and_then(|connect| runtime().block_on(connect.start_connect(target, port)));
    status_of(result)
}

/// Bound data directory of a local connection as an allocated string;
/// release with [`connect_path_destroy`].
#[no_mangle]
pub unsafe extern "C" fn connect_target_path(handle: Handle, out: *mut *mut c_char) -> u8 {
    if out.is_null() {
        return STATUS_INVALID_ARGUMENT;
    }
    let connect = match get_connect(handle) {
        Ok(connect) => connect,
        Err(err) => return err.status(),
    };
    let Some(path) = connect.target_path() else {
        return STATUS_INVALID_ARGUMENT;
    };
    let Some(raw) = path.to_str().and_then(alloc_c_string) else {
        return STATUS_OS_ERROR;
    };
    *out = raw;
    STATUS_OK
}

#[no_mangle]
pub unsafe extern "C" fn connect_path_destroy(path: *mut c_char) {
    if !path.is_null() {
        drop(CString::from_raw(path));
    }
}

// ---------------------------------------------------------------------------
// queuelist_*
// ---------------------------------------------------------------------------

/// Build the queue-list behind a bound connection. The connection becomes
/// owned by the list; destroying its handle no longer tears it down.
#[no_mangle]
pub unsafe extern "C" fn queuelist_init(conn: Handle, out: *mut Handle) -> u8 {
    if out.is_null() {
        return STATUS_INVALID_ARGUMENT;
    }
    let current = *out;
    if with_registry(|registry| registry.is_valid(current)) {
        return STATUS_INVALID_ARGUMENT;
    }
    let connect = match get_connect(conn) {
        Ok(connect) => connect,
        Err(err) => return err.status(),
    };
    let list = match runtime().block_on(connect.open_queue_list()) {
        Ok(list) => list,
        Err(err) => {
            error!(%err, "failed to open queue list");
            return err.status();
        }
    };

    let mut registry = registry().lock().expect("registry lock poisoned");
    *out = registry.create(RegistryObject::QueueList(list));
    registry.take_owned(conn);
    STATUS_OK
}

#[no_mangle]
pub unsafe extern "C" fn queuelist_destroy(handle: Handle) -> u8 {
    with_registry(|registry| {
        if registry.kind(handle) != Some(ObjectKind::QueueList) {
            return STATUS_INVALID_ARGUMENT;
        }
        registry.remove(handle);
        STATUS_OK
    })
}

#[no_mangle]
pub unsafe extern "C" fn queuelist_create_queue(handle: Handle, name: *const c_char) -> u8 {
    let name = match cstr_arg(name) {
        Ok(name) => name,
        Err(err) => return err.status(),
    };
    let result =
        get_queue_list(handle).and_then(|list| runtime().block_on(list.create_queue(name)));
    status_of(result)
}

/// All queue names as an allocated string array; release with
/// [`queuelist_name_array_destroy`].
#[no_mangle]
pub unsafe extern "C" fn queuelist_list_queue(
    handle: Handle,
    out: *mut *mut *mut c_char,
    out_len: *mut usize,
) -> u8 {
    if out.is_null() || out_len.is_null() {
        return STATUS_INVALID_ARGUMENT;
    }
    let list = match get_queue_list(handle) {
        Ok(list) => list,
        Err(err) => return err.status(),
    };
    let names = match runtime().block_on(list.list_queue()) {
        Ok(names) => names,
        Err(err) => return err.status(),
    };

    *out_len = names.len();
    if names.is_empty() {
        *out = ptr::null_mut();
        return STATUS_OK;
    }

    let mut raw: Vec<*mut c_char> = Vec::with_capacity(names.len());
    for name in &names {
        match alloc_c_string(name) {
            Some(p) => raw.push(p),
            None => {
                for p in raw {
                    drop(CString::from_raw(p));
                }
                return STATUS_OS_ERROR;
            }
        }
    }
    *out = into_raw_array(raw);
    STATUS_OK
}

#[no_mangle]
pub unsafe extern "C" fn queuelist_name_array_destroy(names: *mut *mut c_char, len: usize) {
    if names.is_null() {
        return;
    }
    let names = from_raw_array(names, len);
    for name in names.iter() {
        if !name.is_null() {
            drop(CString::from_raw(*name));
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn queuelist_delete_queue(handle: Handle, name: *const c_char) -> u8 {
    let name = match cstr_arg(name) {
        Ok(name) => name,
        Err(err) => return err.status(),
    };
    let result =
        get_queue_list(handle).and_then(|list| runtime().block_on(list.delete_queue(name)));
    status_of(result)
}

#[no_mangle]
pub unsafe extern "C" fn queuelist_rename_queue(
    handle: Handle,
    old_name: *const c_char,
    new_name: *const c_char,
) -> u8 {
    let old_name = match cstr_arg(old_name) {
        Ok(name) => name,
        Err(err) => return err.status(),
    };
    let new_name = match cstr_arg(new_name) {
        Ok(name) => name,
        Err(err) => return err.status(),
    };
    let result = get_queue_list(handle)
        .and_then(|list| runtime().block_on(list.rename_queue(old_name, new_name)));
    status_of(result)
}

/// Hand out a queue handle. The queue stays owned by its list; pair with
/// [`queuelist_return_queue`].
#[no_mangle]
pub unsafe extern "C" fn queuelist_get_queue(
    handle: Handle,
    name: *const c_char,
    out: *mut Handle,
) -> u8 {
    if out.is_null() {
        return STATUS_INVALID_ARGUMENT;
    }
    let current = *out;
    if with_registry(|registry| registry.is_valid(current)) {
        return STATUS_INVALID_ARGUMENT;
    }
    let name = match cstr_arg(name) {
        Ok(name) => name,
        Err(err) => return err.status(),
    };
    let result =
        get_queue_list(handle).and_then(|list| runtime().block_on(list.get_queue(name)));
    match result {
        Ok(queue) => {
            let mut registry = registry().lock().expect("registry lock poisoned");
            let created = registry.create(RegistryObject::Queue(queue));
            registry.take_owned(created);
            *out = created;
            STATUS_OK
        }
        Err(err) => err.status(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn queuelist_return_queue(handle: Handle, queue: Handle) -> u8 {
    let list = match get_queue_list(handle) {
        Ok(list) => list,
        Err(err) => return err.status(),
    };
    let Some(queue_ref) = with_registry(|registry| {
        let queue_ref = registry.queue(queue)?;
        registry.remove(queue);
        Some(queue_ref)
    }) else {
        return STATUS_INVALID_ARGUMENT;
    };
    runtime().block_on(list.return_queue(queue_ref));
    STATUS_OK
}

// ---------------------------------------------------------------------------
// queue_*
// ---------------------------------------------------------------------------

unsafe fn list_ids(
    handle: Handle,
    out: *mut *mut i32,
    out_len: *mut usize,
    finished: bool,
) -> u8 {
    if out.is_null() || out_len.is_null() {
        return STATUS_INVALID_ARGUMENT;
    }
    let queue = match get_queue(handle) {
        Ok(queue) => queue,
        Err(err) => return err.status(),
    };
    let ids = match runtime().block_on(async {
        if finished {
            queue.list_finished().await
        } else {
            queue.list_pending().await
        }
    }) {
        Ok(ids) => ids,
        Err(err) => return err.status(),
    };

    *out_len = ids.len();
    if ids.is_empty() {
        *out = ptr::null_mut();
    } else {
        *out = into_raw_array(ids);
    }
    STATUS_OK
}

/// Pending task IDs as an allocated array; release with
/// [`queue_id_array_destroy`].
#[no_mangle]
pub unsafe extern "C" fn queue_list_pending(
    handle: Handle,
    out: *mut *mut i32,
    out_len: *mut usize,
) -> u8 {
    list_ids(handle, out, out_len, false)
}

/// Finished task IDs as an allocated array; release with
/// [`queue_id_array_destroy`].
#[no_mangle]
pub unsafe extern "C" fn queue_list_finished(
    handle: Handle,
    out: *mut *mut i32,
    out_len: *mut usize,
) -> u8 {
    list_ids(handle, out, out_len, true)
}

#[no_mangle]
pub unsafe extern "C" fn queue_id_array_destroy(ids: *mut i32, len: usize) {
    if !ids.is_null() {
        drop(from_raw_array(ids, len));
    }
}

#[no_mangle]
pub unsafe extern "C" fn queue_pending_details(handle: Handle, id: i32, out: *mut CTask) -> u8 {
    let queue = match get_queue(handle) {
        Ok(queue) => queue,
        Err(err) => return err.status(),
    };
    match runtime().block_on(queue.pending_details(id)) {
        Ok(task) => task_to_c(&task, out),
        Err(err) => err.status(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn queue_finished_details(handle: Handle, id: i32, out: *mut CTask) -> u8 {
    let queue = match get_queue(handle) {
        Ok(queue) => queue,
        Err(err) => return err.status(),
    };
    match runtime().block_on(queue.finished_details(id)) {
        Ok(task) => task_to_c(&task, out),
        Err(err) => err.status(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn queue_clear_pending(handle: Handle) -> u8 {
    let result = get_queue(handle).and_then(|queue| runtime().block_on(queue.clear_pending()));
    status_of(result)
}

#[no_mangle]
pub unsafe extern "C" fn queue_clear_finished(handle: Handle) -> u8 {
    let result = get_queue(handle).and_then(|queue| runtime().block_on(queue.clear_finished()));
    status_of(result)
}

#[no_mangle]
pub unsafe extern "C" fn queue_current_task(handle: Handle, out: *mut CTask) -> u8 {
    let queue = match get_queue(handle) {
        Ok(queue) => queue,
        Err(err) => return err.status(),
    };
    match runtime().block_on(queue.current_task()) {
        Ok(task) => task_to_c(&task, out),
        Err(err) => err.status(),
    }
}

/// Enqueue a task; the assigned ID is written to `out_id`.
#[no_mangle]
pub unsafe extern "C" fn queue_add_task(
    handle: Handle,
    task: *const CTask,
    out_id: *mut i32,
) -> u8 {
    if out_id.is_null() {
        return STATUS_INVALID_ARGUMENT;
    }
    let task = match task_from_c(task) {
        Ok(task) => task,
        Err(err) => return err.status(),
    };
    let result = get_queue(handle).and_then(|queue| runtime().block_on(queue.add_task(task)));
    match result {
        Ok(id) => {
            *out_id = id;
            STATUS_OK
        }
        Err(err) => err.status(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn queue_remove_task(handle: Handle, id: i32) -> u8 {
    let result = get_queue(handle).and_then(|queue| runtime().block_on(queue.remove_task(id)));
    status_of(result)
}

#[no_mangle]
pub unsafe extern "C" fn queue_is_running(handle: Handle, out: *mut u8) -> u8 {
    if out.is_null() {
        return STATUS_INVALID_ARGUMENT;
    }
    let result = get_queue(handle).and_then(|queue| runtime().block_on(queue.is_running()));
    match result {
        Ok(running) => {
            *out = running as u8;
            STATUS_OK
        }
        Err(err) => err.status(),
    }
}

/// Drain the output window into an allocated chunk array; release with
/// [`queue_output_destroy`].
#[no_mangle]
pub unsafe extern "C" fn queue_read_current_output(
    handle: Handle,
    out: *mut *mut CChunk,
    out_len: *mut usize,
) -> u8 {
    if out.is_null() || out_len.is_null() {
        return STATUS_INVALID_ARGUMENT;
    }
    let queue = match get_queue(handle) {
        Ok(queue) => queue,
        Err(err) => return err.status(),
    };
    let chunks = match runtime().block_on(queue.read_current_output()) {
        Ok(chunks) => chunks,
        Err(err) => return err.status(),
    };

    *out_len = chunks.len();
    if chunks.is_empty() {
        *out = ptr::null_mut();
        return STATUS_OK;
    }

    let raw: Vec<CChunk> = chunks
        .into_iter()
        .map(|chunk| {
            let len = chunk.len();
            CChunk {
                data: into_raw_array(chunk),
                len,
            }
        })
        .collect();
    *out = into_raw_array(raw);
    STATUS_OK
}

#[no_mangle]
pub unsafe extern "C" fn queue_output_destroy(chunks: *mut CChunk, len: usize) {
    if chunks.is_null() {
        return;
    }
    let chunks = from_raw_array(chunks, len);
    for chunk in chunks.iter() {
        if !chunk.data.is_null() {
            drop(from_raw_array(chunk.data, chunk.len));
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn queue_start(handle: Handle) -> u8 {
    let result = get_queue(handle).and_then(|queue| runtime().block_on(queue.start()));
    status_of(result)
}

#[no_mangle]
pub unsafe extern "C" fn queue_stop(handle: Handle) -> u8 {
    let result = get_queue(handle).and_then(|queue| runtime().block_on(queue.stop()));
    status_of(result)
}

/// Release the contents of a task filled by the details calls. The struct
/// itself belongs to the caller.
#[no_mangle]
pub unsafe extern "C" fn queue_task_destroy(task: *mut CTask) {
    if task.is_null() {
        return;
    }
    let task = &mut *task;
    if !task.exec_name.is_null() {
        drop(CString::from_raw(task.exec_name));
    }
    if task.argc > 0 && !task.argv.is_null() {
        let argv = from_raw_array(task.argv, task.argc);
        for arg in argv.iter() {
            if !arg.is_null() {
                drop(CString::from_raw(*arg));
            }
        }
    }
    if !task.work_dir.is_null() {
        drop(CString::from_raw(task.work_dir));
    }
    *task = CTask {
        id: 0,
        exec_name: ptr::null_mut(),
        argc: 0,
        argv: ptr::null_mut(),
        work_dir: ptr::null_mut(),
        exit_code: 0,
        is_success: 0,
    };
}

// ---------------------------------------------------------------------------
// Function-pointer model for embedders that load the library dynamically.
// ---------------------------------------------------------------------------

#[repr(C)]
pub struct CConnectApi {
    pub init: unsafe extern "C" fn(u8, *mut Handle) -> u8,
    pub destroy: unsafe extern "C" fn(Handle) -> u8,
    pub start_connect: unsafe extern "C" fn(Handle, *const c_char, u16) -> u8,
    pub target_path: unsafe extern "C" fn(Handle, *mut *mut c_char) -> u8,
    pub path_destroy: unsafe extern "C" fn(*mut c_char),
}

#[repr(C)]
pub struct CQueueListApi {
    pub init: unsafe extern "C" fn(Handle, *mut Handle) -> u8,
    pub destroy: unsafe extern "C" fn(Handle) -> u8,
    pub create_queue: unsafe extern "C" fn(Handle, *const c_char) -> u8,
    pub list_queue: unsafe extern "C" fn(Handle, *mut *mut *mut c_char, *mut usize) -> u8,
    pub name_array_destroy: unsafe extern "C" fn(*mut *mut c_char, usize),
    pub delete_queue: unsafe extern "C" fn(Handle, *const c_char) -> u8,
    pub rename_queue: unsafe extern "C" fn(Handle, *const c_char, *const c_char) -> u8,
    pub get_queue: unsafe extern "C" fn(Handle, *const c_char, *mut Handle) -> u8,
    pub return_queue: unsafe extern "C" fn(Handle, Handle) -> u8,
}

#[repr(C)]
pub struct CQueueApi {
    pub list_pending: unsafe extern "C" fn(Handle, *mut *mut i32, *mut usize) -> u8,
    pub list_finished: unsafe extern "C" fn(Handle, *mut *mut i32, *mut usize) -> u8,
    pub id_array_destroy: unsafe extern "C" fn(*mut i32, usize),
    pub pending_details: unsafe extern "C" fn(Handle, i32, *mut CTask) -> u8,
    pub finished_details: unsafe extern "C" fn(Handle, i32, *mut CTask) -> u8,
    pub clear_pending: unsafe extern "C" fn(Handle) -> u8,
    pub clear_finished: unsafe extern "C" fn(Handle) -> u8,
    pub current_task: unsafe extern "C" fn(Handle, *mut CTask) -> u8,
    pub add_task: unsafe extern "C" fn(Handle, *const CTask, *mut i32) -> u8,
    pub remove_task: unsafe extern "C" fn(Handle, i32) -> u8,
    pub is_running: unsafe extern "C" fn(Handle, *mut u8) -> u8,
    pub read_current_output: unsafe extern "C" fn(Handle, *mut *mut CChunk, *mut usize) -> u8,
    pub output_destroy: unsafe extern "C" fn(*mut CChunk, usize),
    pub start: unsafe extern "C" fn(Handle) -> u8,
    pub stop: unsafe extern "C" fn(Handle) -> u8,
    pub task_destroy: unsafe extern "C" fn(*mut CTask),
}

/// The whole C surface as one function-pointer table.
#[repr(C)]
pub struct CModel {
    pub connect: CConnectApi,
    pub queue_list: CQueueListApi,
    pub queue: CQueueApi,
}

/// Fill `out` with the function-pointer table.
#[no_mangle]
pub unsafe extern "C" fn capi_model(out: *mut CModel) -> u8 {
    if out.is_null() {
        return STATUS_INVALID_ARGUMENT;
    }
    *out = CModel {
        connect: CConnectApi {
            init: connect_init,
            destroy: connect_destroy,
            start_connect: connect_start_connect,
            target_path: connect_target_path,
            path_destroy: connect_path_destroy,
        },
        queue_list: CQueueListApi {
            init: queuelist_init,
            destroy: queuelist_destroy,
            create_queue: queuelist_create_queue,
            list_queue: queuelist_list_queue,
            name_array_destroy: queuelist_name_array_destroy,
            delete_queue: queuelist_delete_queue,
            rename_queue: queuelist_rename_queue,
            get_queue: queuelist_get_queue,
            return_queue: queuelist_return_queue,
        },
        queue: CQueueApi {
            list_pending: queue_list_pending,
            list_finished: queue_list_finished,
            id_array_destroy: queue_id_array_destroy,
            pending_details: queue_pending_details,
            finished_details: queue_finished_details,
            clear_pending: queue_clear_pending,
            clear_finished: queue_clear_finished,
            current_task: queue_current_task,
            add_task: queue_add_task,
            remove_task: queue_remove_task,
            is_running: queue_is_running,
            read_current_output: queue_read_current_output,
            output_destroy: queue_output_destroy,
            start: queue_start,
            stop: queue_stop,
            task_destroy: queue_task_destroy,
        },
    };
    STATUS_OK
}
