//! Handle lifecycle and data marshalling over the C surface.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use flowq_core::capi::{
    capi_model, connect_destroy, connect_init, connect_path_destroy, connect_start_connect,
    connect_target_path, queue_add_task, queue_id_array_destroy, queue_is_running,
    queue_list_pending, queue_pending_details, queue_remove_task, queue_task_destroy,
    queuelist_create_queue, queuelist_destroy, queuelist_get_queue, queuelist_init,
    queuelist_list_queue, queuelist_name_array_destroy, queuelist_return_queue, CModel, CTask,
    BACKEND_LOCAL,
};
use flowq_core::error::{
    STATUS_ALREADY_EXISTS, STATUS_INVALID_ARGUMENT, STATUS_NOT_FOUND, STATUS_OK,
};
use flowq_core::registry::Handle;

#[test]
fn test_full_handle_flow() {
    let dir = tempfile::tempdir().unwrap();
    let dir_c = CString::new(dir.path().to_str().unwrap()).unwrap();

    unsafe {
        let mut conn = Handle::INVALID;
        assert_eq!(connect_init(BACKEND_LOCAL, &mut conn), STATUS_OK);
        // A still-valid handle in `out` is refused.
        assert_eq!(connect_init(BACKEND_LOCAL, &mut conn), STATUS_INVALID_ARGUMENT);
        assert_eq!(connect_start_connect(conn, dir_c.as_ptr(), 0), STATUS_OK);

        let mut path: *mut c_char = ptr::null_mut();
        assert_eq!(connect_target_path(conn, &mut path), STATUS_OK);
        assert_eq!(
            CStr::from_ptr(path).to_str().unwrap(),
            dir.path().to_str().unwrap()
        );
        connect_path_destroy(path);

        let mut list = Handle::INVALID;
        assert_eq!(queuelist_init(conn, &mut list), STATUS_OK);

        let name = CString::new("cq").unwrap();
        assert_eq!(queuelist_create_queue(list, name.as_ptr()), STATUS_OK);
        assert_eq!(
            queuelist_create_queue(list, name.as_ptr()),
            STATUS_ALREADY_EXISTS
        );

        let mut names: *mut *mut c_char = ptr::null_mut();
        let mut names_len = 0usize;
        assert_eq!(
            queuelist_list_queue(list, &mut names, &mut names_len),
            STATUS_OK
        );
        assert_eq!(names_len, 1);
        assert_eq!(CStr::from_ptr(*names).to_str().unwrap(), "cq");
        queuelist_name_array_destroy(names, names_len);

        let mut queue = Handle::INVALID;
        assert_eq!(
            queuelist_get_queue(list, name.as_ptr(), &mut queue),
            STATUS_OK
        );

        // Enqueue through the C task struct.
        let exec = CString::new("/bin/echo").unwrap();
        let arg = CString::new("capi").unwrap();
        let mut argv = [arg.as_ptr() as *mut c_char];
        let input = CTask {
            id: 0,
            exec_name: exec.as_ptr() as *mut c_char,
            argc: 1,
            argv: argv.as_mut_ptr(),
            work_dir: ptr::null_mut(),
            exit_code: 0,
            is_success: 0,
        };
        let mut id = -1i32;
        assert_eq!(queue_add_task(queue, &input, &mut id), STATUS_OK);
        assert!(id > 0);

        let mut ids: *mut i32 = ptr::null_mut();
        let mut ids_len = 0usize;
        assert_eq!(queue_list_pending(queue, &mut ids, &mut ids_len), STATUS_OK);
        assert_eq!(ids_len, 1);
        assert_eq!(*ids, id);
        queue_id_array_destroy(ids, ids_len);

        let mut details = std::mem::zeroed::<CTask>();
        assert_eq!(queue_pending_details(queue, id, &mut details), STATUS_OK);
        assert_eq!(details.id, id);
        assert_eq!(
            CStr::from_ptr(details.exec_name).to_str().unwrap(),
            "/bin/echo"
        );
        assert_eq!(details.argc, 1);
        assert_eq!(CStr::from_ptr(*details.argv).to_str().unwrap(), "capi");
        // An empty working directory marshals as a null pointer.
        assert!(details.work_dir.is_null());
        queue_task_destroy(&mut details);
        assert!(details.exec_name.is_null());

        let mut running = 42u8;
        assert_eq!(queue_is_running(queue, &mut running), STATUS_OK);
        assert_eq!(running, 0);

        assert_eq!(queue_remove_task(queue, id), STATUS_OK);
        assert_eq!(queue_remove_task(queue, id), STATUS_NOT_FOUND);

        // Returning the queue releases the handle; further use is stale.
        assert_eq!(queuelist_return_queue(list, queue), STATUS_OK);
        assert_eq!(
            queue_is_running(queue, &mut running),
            STATUS_INVALID_ARGUMENT
        );

        assert_eq!(queuelist_destroy(list), STATUS_OK);
        assert_eq!(connect_destroy(conn), STATUS_OK);
        assert_eq!(connect_destroy(conn), STATUS_INVALID_ARGUMENT);
    }
}

#[test]
fn test_argument_validation() {
    unsafe {
        assert_eq!(connect_init(BACKEND_LOCAL, ptr::null_mut()), STATUS_INVALID_ARGUMENT);

        let mut handle = Handle::INVALID;
        assert_eq!(connect_init(99, &mut handle), STATUS_INVALID_ARGUMENT);
        assert_eq!(handle, Handle::INVALID);

        // Operations through never-issued handles fail cleanly.
        let stale = Handle {
            index: 1234,
            generation: 7,
        };
        let mut running = 0u8;
        assert_eq!(queue_is_running(stale, &mut running), STATUS_INVALID_ARGUMENT);
        assert_eq!(queuelist_destroy(stale), STATUS_INVALID_ARGUMENT);

        assert_eq!(
            connect_start_connect(stale, ptr::null(), 0),
            STATUS_INVALID_ARGUMENT
        );
    }
}

#[test]
fn test_model_table_routes_to_the_same_registry() {
    let dir = tempfile::tempdir().unwrap();
    let dir_c = CString::new(dir.path().to_str().unwrap()).unwrap();

    unsafe {
        let mut model = std::mem::MaybeUninit::<CModel>::uninit();
        assert_eq!(capi_model(model.as_mut_ptr()), STATUS_OK);
        let model = model.assume_init();

        let mut conn = Handle::INVALID;
        assert_eq!((model.connect.init)(BACKEND_LOCAL, &mut conn), STATUS_OK);
        assert_eq!(
            (model.connect.start_connect)(conn, dir_c.as_ptr(), 0),
            STATUS_OK
        );

        let mut list = Handle::INVALID;
        assert_eq!((model.queue_list.init)(conn, &mut list), STATUS_OK);
        let name = CString::new("via-table").unwrap();
        assert_eq!((model.queue_list.create_queue)(list, name.as_ptr()), STATUS_OK);

        // The plain exported function sees the queue created via the table.
        let mut queue = Handle::INVALID;
        assert_eq!(
            queuelist_get_queue(list, name.as_ptr(), &mut queue),
            STATUS_OK
        );
        assert_eq!((model.queue_list.return_queue)(list, queue), STATUS_OK);

        assert_eq!((model.queue_list.destroy)(list), STATUS_OK);
        assert_eq!((model.connect.destroy)(conn), STATUS_OK);
    }
}
