#![warn(missing_docs)]
//! # viewer-lock-app binary
//!
//! Desktop entry point for viewer-lock.

/// Process entry point.
fn main() {
    #[cfg(windows)]
    {
        if let Err(error) = win32_ui::run_main_window() {
            eprintln!("failed to start viewer-lock: {error}");
            std::process::exit(1);
        }
    }

    #[cfg(not(windows))]
    {
        let env_file = viewer_lock_app::executable_dir()
            .map(|dir| dir.join(viewer_lock_app::ENV_FILE_NAME))
            .unwrap_or_else(|_| viewer_lock_app::ENV_FILE_NAME.into());
        let config = viewer_lock_app::load_configuration(&env_file);
        println!("viewer-lock-app {}", viewer_lock_app::app_version());
        println!("{}", viewer_lock_app::startup_summary(&config));
        println!("the locked viewer window is only available on Windows");
    }
}

#[cfg(windows)]
mod win32_ui {
    //! Native Win32 shell: one fixed-size locked window hosting the countdown,
    //! banner, credential prompt, and close warning.

    use std::cell::RefCell;
    use std::ffi::c_void;
    use std::ptr::{null, null_mut};

    use viewer_lock_app::{
        AppError, ENV_FILE_NAME, app_version, executable_dir, init_logging, load_configuration,
        redact_sensitive, startup_summary,
    };
    use viewer_lock_core::{ProcessEnv, os_username_from};
    use viewer_lock_host::{
        ClientBridge, CloseDecision, Host, HostError, LifecycleAction, SharedHost, WindowControl,
        WindowSpec,
    };
    use viewer_lock_ui::{ASCII_BANNER, CLOSE_WARNING_TEXT, ViewerClient};
    use windows_sys::Win32::Foundation::{HWND, LPARAM, LRESULT, RECT, WPARAM};
    use windows_sys::Win32::Graphics::Gdi::{ANSI_FIXED_FONT, COLOR_WINDOW, GetStockObject};
    use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows_sys::Win32::UI::Input::KeyboardAndMouse::SetFocus;
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        AdjustWindowRectEx, BN_CLICKED, BS_DEFPUSHBUTTON, CS_HREDRAW, CS_VREDRAW, CW_USEDEFAULT,
        CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, ES_AUTOHSCROLL,
        ES_PASSWORD, GetMessageW, GetWindowTextLengthW, GetWindowTextW, IDC_ARROW,
        IsDialogMessageW, KillTimer, LoadCursorW, MSG, PostMessageW, PostQuitMessage,
        RegisterClassW, SW_HIDE, SW_SHOW, SendMessageW, SetTimer, SetWindowTextW, ShowWindow,
        TranslateMessage, WM_CLOSE, WM_COMMAND, WM_DESTROY, WM_SETFONT, WM_TIMER, WNDCLASSW,
        WS_BORDER, WS_CAPTION, WS_CHILD, WS_MAXIMIZEBOX, WS_MINIMIZEBOX, WS_OVERLAPPED,
        WS_SYSMENU, WS_TABSTOP, WS_THICKFRAME, WS_VISIBLE,
    };

    // IDOK, so Enter in the edits reaches the button through IsDialogMessageW.
    const CONTROL_ID_UNLOCK_BUTTON: i32 = 1;
    const CONTROL_ID_USERNAME_EDIT: i32 = 1001;
    const CONTROL_ID_PASSWORD_EDIT: i32 = 1002;

    const TIMER_COUNTDOWN_ID: usize = 1;
    const COUNTDOWN_INTERVAL_MS: u32 = 1_000;
    const WINDOW_CLASS_NAME: &str = "ViewerLockMainWindowClass";

    std::thread_local! {
        static SHELL: RefCell<Option<ShellController>> = const { RefCell::new(None) };
    }

    /// Native window handle as seen by the host.
    struct NativeWindow {
        hwnd: HWND,
    }

    impl WindowControl for NativeWindow {
        fn request_close(&mut self) {
            unsafe {
                // Safety:
                // - Posts to the UI thread queue; WM_CLOSE re-enters through
                //   the close interceptor once the current handler returns.
                PostMessageW(self.hwnd, WM_CLOSE, 0, 0);
            }
        }
    }

    #[derive(Default)]
    struct ControlHandles {
        banner: HWND,
        countdown: HWND,
        username_edit: HWND,
        password_edit: HWND,
        status: HWND,
        warning: HWND,
    }

    struct ShellController {
        host: SharedHost<NativeWindow>,
        client: ViewerClient<ClientBridge<NativeWindow>>,
        controls: ControlHandles,
        timer_running: bool,
    }

    #[derive(Clone, Copy)]
    struct Bounds {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    }

    impl Bounds {
        const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
            Self {
                x,
                y,
                width,
                height,
            }
        }
    }

    /// Starts the locked window and blocks until it has been closed.
    pub fn run_main_window() -> Result<(), AppError> {
        let exe_dir = executable_dir()?;
        init_logging(&exe_dir)?;

        let config = load_configuration(&exe_dir.join(ENV_FILE_NAME));
        tracing::info!(stage = "bootstrap", action = "startup", summary = %startup_summary(&config));

        let instance = unsafe {
            // Safety:
            // - Passing null requests the current process module instance handle.
            GetModuleHandleW(null())
        };
        if instance.is_null() {
            return Err(platform_error("module_handle", "GetModuleHandleW returned null"));
        }

        let class_name = to_wide(WINDOW_CLASS_NAME);
        register_window_class(instance, &class_name)?;

        let mut host = Host::new(config, os_username_from(&ProcessEnv))
            .with_title(format!("Viewer {}", app_version()));
        let mut created: HWND = null_mut();
        host.create_window(|spec| {
            let window = create_main_window(spec, instance, &class_name)?;
            created = window.hwnd;
            Ok(window)
        })
        .map_err(|error| {
            log_error("window", "create", &error.to_string());
            AppError::from(error)
        })?;
        let hwnd = created;

        let host = host.into_shared();
        let client = ViewerClient::new(host.bridge()?);

        let controls = create_controls(hwnd, instance, client.state().username_prefill.as_str())?;
        SHELL.with(|slot| {
            *slot.borrow_mut() = Some(ShellController {
                host,
                client,
                controls,
                timer_running: false,
            });
        });

        with_shell(|shell| {
            shell.client.start();
            if !shell.client.state().is_unlocked() {
                unsafe {
                    // Safety:
                    // - `hwnd` is the live main window owned by this thread.
                    SetTimer(hwnd, TIMER_COUNTDOWN_ID, COUNTDOWN_INTERVAL_MS, None);
                }
                shell.timer_running = true;
            }
            refresh_controls(shell);
            Ok(())
        })?;

        unsafe {
            // Safety:
            // - `hwnd` is a valid window handle created above.
            ShowWindow(hwnd, SW_SHOW);
        }

        run_message_loop(hwnd)
    }

    fn run_message_loop(hwnd: HWND) -> Result<(), AppError> {
        tracing::info!(stage = "event_loop", action = "begin");
        let mut message: MSG = unsafe {
            // Safety:
            // - Zero-initialization before first `GetMessageW` is valid.
            std::mem::zeroed()
        };

        loop {
            let result = unsafe {
                // Safety:
                // - `message` pointer remains valid across loop iterations.
                GetMessageW(&mut message, null_mut(), 0, 0)
            };
            if result == -1 {
                return Err(platform_error("get_message", "GetMessageW returned -1"));
            }
            if result == 0 {
                tracing::info!(stage = "event_loop", action = "end", "WM_QUIT received");
                return Ok(());
            }

            unsafe {
                // Safety:
                // - `message` contents came from `GetMessageW`; `hwnd` may
                //   already be destroyed, in which case the call returns 0.
                if IsDialogMessageW(hwnd, &message) == 0 {
                    TranslateMessage(&message);
                    DispatchMessageW(&message);
                }
            }
        }
    }

    extern "system" fn window_proc(
        hwnd: HWND,
        message: u32,
        w_param: WPARAM,
        l_param: LPARAM,
    ) -> LRESULT {
        match message {
            WM_CLOSE => {
                handle_close(hwnd);
                0
            }
            WM_COMMAND => {
                handle_command(w_param);
                0
            }
            WM_TIMER if w_param == TIMER_COUNTDOWN_ID => {
                handle_countdown_tick(hwnd);
                0
            }
            WM_DESTROY => {
                handle_destroy(hwnd);
                0
            }
            _ => unsafe {
                // Safety:
                // - Delegate unhandled messages to default Win32 behavior.
                DefWindowProcW(hwnd, message, w_param, l_param)
            },
        }
    }

    fn handle_close(hwnd: HWND) {
        // Before the shell is installed the window is locked by definition.
        let decision = with_shell(|shell| {
            let decision = shell.host.with_host(|host| host.handle_close_request())?;
            shell.client.sync_events();
            refresh_controls(shell);
            Ok(decision)
        })
        .unwrap_or(CloseDecision::Suppress);

        if decision == CloseDecision::Proceed {
            unsafe {
                // Safety:
                // - Called with no shell borrow held; WM_DESTROY re-enters
                //   `window_proc` synchronously.
                DestroyWindow(hwnd);
            }
        }
    }

    fn handle_command(w_param: WPARAM) {
        let control_id = loword(w_param) as i32;
        let notification = hiword(w_param) as u32;
        if control_id != CONTROL_ID_UNLOCK_BUTTON || notification != BN_CLICKED as u32 {
            return;
        }

        let result = with_shell(|shell| {
            let username = read_control_text(shell.controls.username_edit)?;
            let password = read_control_text(shell.controls.password_edit)?;
            let status = shell.client.submit_credentials(&username, &password);
            tracing::info!(stage = "ui", action = "submit", status = ?status);

            set_control_text(shell.controls.password_edit, "");
            if !shell.client.state().is_unlocked() {
                unsafe {
                    // Safety:
                    // - Password edit is a live child of the main window.
                    SetFocus(shell.controls.password_edit);
                }
            }
            refresh_controls(shell);
            Ok(())
        });

        if let Err(error) = result {
            log_error("ui", "submit", &error.to_string());
        }
    }

    fn handle_countdown_tick(hwnd: HWND) {
        let result = with_shell(|shell| {
            shell.client.tick();
            shell.client.sync_events();
            if shell.client.state().is_unlocked() {
                stop_countdown(hwnd, shell);
            }
            refresh_controls(shell);
            Ok(())
        });

        if let Err(error) = result {
            log_error("ui", "tick", &error.to_string());
        }
    }

    fn handle_destroy(hwnd: HWND) {
        let action = with_shell(|shell| {
            stop_countdown(hwnd, shell);
            Ok(shell.host.with_host(|host| host.window_destroyed())?)
        })
        .unwrap_or(LifecycleAction::Quit);

        if action == LifecycleAction::Quit {
            tracing::info!(stage = "ui", action = "destroy", "posting quit");
            unsafe {
                // Safety:
                // - Ends the message loop on the UI thread.
                PostQuitMessage(0);
            }
        }
    }

    fn stop_countdown(hwnd: HWND, shell: &mut ShellController) {
        if shell.timer_running {
            unsafe {
                // Safety:
                // - Timer ID is owned by this window and can be cancelled here.
                KillTimer(hwnd, TIMER_COUNTDOWN_ID);
            }
            shell.timer_running = false;
        }
    }

    fn refresh_controls(shell: &ShellController) {
        let view = shell.client.view();
        set_control_text(shell.controls.countdown, &view.countdown);
        set_control_text(shell.controls.status, &view.status);
        set_visible(shell.controls.banner, view.banner_visible);
        set_visible(shell.controls.warning, view.warning_visible);
    }

    fn register_window_class(instance: *mut c_void, class_name: &[u16]) -> Result<(), AppError> {
        let cursor = unsafe {
            // Safety:
            // - Uses predefined system cursor identifier.
            LoadCursorW(null_mut(), IDC_ARROW)
        };

        let window_class = WNDCLASSW {
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(window_proc),
            hInstance: instance,
            lpszClassName: class_name.as_ptr(),
            hCursor: cursor,
            hbrBackground: (COLOR_WINDOW as usize + 1) as *mut c_void,
            ..unsafe {
                // Safety:
                // - Zero-initialization for unused optional fields is valid.
                std::mem::zeroed()
            }
        };

        let atom = unsafe {
            // Safety:
            // - `window_class` is fully initialized and `class_name` outlives the call.
            RegisterClassW(&window_class)
        };
        if atom == 0 {
            return Err(platform_error("register_class", "RegisterClassW failed"));
        }
        Ok(())
    }

    fn window_style(spec: &WindowSpec) -> u32 {
        let mut style = WS_OVERLAPPED | WS_CAPTION | WS_SYSMENU;
        if spec.resizable {
            style |= WS_THICKFRAME;
        }
        if spec.minimizable {
            style |= WS_MINIMIZEBOX;
        }
        if spec.maximizable {
            style |= WS_MAXIMIZEBOX;
        }
        style
    }

    fn create_main_window(
        spec: &WindowSpec,
        instance: *mut c_void,
        class_name: &[u16],
    ) -> Result<NativeWindow, HostError> {
        let style = window_style(spec);
        let mut frame = RECT {
            left: 0,
            top: 0,
            right: spec.width as i32,
            bottom: spec.height as i32,
        };
        unsafe {
            // Safety:
            // - `frame` is a valid, writable RECT for the duration of the call.
            AdjustWindowRectEx(&mut frame, style, i32::from(spec.show_menu), 0);
        }

        let title = to_wide(&spec.title);
        let hwnd = unsafe {
            // Safety:
            // - Class and title pointers are valid for the call.
            // - A null menu handle leaves the window without a menu bar.
            CreateWindowExW(
                0,
                class_name.as_ptr(),
                title.as_ptr(),
                style,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                frame.right - frame.left,
                frame.bottom - frame.top,
                null_mut(),
                null_mut(),
                instance,
                null(),
            )
        };
        if hwnd.is_null() {
            return Err(HostError::WindowCreation("CreateWindowExW failed".to_string()));
        }

        Ok(NativeWindow { hwnd })
    }

    fn create_controls(
        hwnd: HWND,
        instance: *mut c_void,
        username_prefill: &str,
    ) -> Result<ControlHandles, AppError> {
        let static_style = WS_CHILD | WS_VISIBLE;
        let edit_style = WS_CHILD | WS_VISIBLE | WS_BORDER | WS_TABSTOP | ES_AUTOHSCROLL as u32;
        let button_style = WS_CHILD | WS_VISIBLE | WS_TABSTOP | BS_DEFPUSHBUTTON as u32;

        let banner_text = ASCII_BANNER.trim_matches('\n').replace('\n', "\r\n");
        let banner = create_child_control(
            hwnd,
            instance,
            "STATIC",
            &banner_text,
            static_style,
            Bounds::new(40, 24, 720, 140),
            0,
        )?;
        let fixed_font = unsafe {
            // Safety:
            // - Stock objects are owned by the system and never freed by us.
            GetStockObject(ANSI_FIXED_FONT)
        };
        unsafe {
            // Safety:
            // - `banner` is a live STATIC control; lParam=1 requests a redraw.
            SendMessageW(banner, WM_SETFONT, fixed_font as usize, 1);
        }

        let countdown = create_child_control(
            hwnd,
            instance,
            "STATIC",
            "",
            static_style,
            Bounds::new(40, 190, 720, 28),
            0,
        )?;

        create_child_control(
            hwnd,
            instance,
            "STATIC",
            "Username:",
            static_style,
            Bounds::new(40, 250, 120, 22),
            0,
        )?;
        let username_edit = create_child_control(
            hwnd,
            instance,
            "EDIT",
            username_prefill,
            edit_style,
            Bounds::new(170, 248, 300, 24),
            CONTROL_ID_USERNAME_EDIT,
        )?;

        create_child_control(
            hwnd,
            instance,
            "STATIC",
            "Password:",
            static_style,
            Bounds::new(40, 290, 120, 22),
            0,
        )?;
        let password_edit = create_child_control(
            hwnd,
            instance,
            "EDIT",
            "",
            edit_style | ES_PASSWORD as u32,
            Bounds::new(170, 288, 300, 24),
            CONTROL_ID_PASSWORD_EDIT,
        )?;

        create_child_control(
            hwnd,
            instance,
            "BUTTON",
            "Unlock",
            button_style,
            Bounds::new(490, 286, 120, 28),
            CONTROL_ID_UNLOCK_BUTTON,
        )?;

        let status = create_child_control(
            hwnd,
            instance,
            "STATIC",
            "",
            static_style,
            Bounds::new(40, 340, 720, 24),
            0,
        )?;
        let warning = create_child_control(
            hwnd,
            instance,
            "STATIC",
            CLOSE_WARNING_TEXT,
            static_style,
            Bounds::new(40, 380, 720, 24),
            0,
        )?;

        unsafe {
            // Safety:
            // - Password edit was created above on this thread.
            SetFocus(password_edit);
        }

        tracing::info!(stage = "ui", action = "controls_created");
        Ok(ControlHandles {
            banner,
            countdown,
            username_edit,
            password_edit,
            status,
            warning,
        })
    }

    fn create_child_control(
        parent: HWND,
        instance: *mut c_void,
        class_name: &str,
        text: &str,
        style: u32,
        bounds: Bounds,
        control_id: i32,
    ) -> Result<HWND, AppError> {
        let class_name_wide = to_wide(class_name);
        let text_wide = to_wide(text);

        let hwnd = unsafe {
            // Safety:
            // - Input pointers are stable for this call and parent/instance handles are valid.
            CreateWindowExW(
                0,
                class_name_wide.as_ptr(),
                text_wide.as_ptr(),
                style,
                bounds.x,
                bounds.y,
                bounds.width,
                bounds.height,
                parent,
                control_id as usize as *mut c_void,
                instance,
                null(),
            )
        };

        if hwnd.is_null() {
            return Err(platform_error(
                "create_control",
                &format!("failed to create control class={class_name} id={control_id}"),
            ));
        }

        Ok(hwnd)
    }

    fn set_visible(control: HWND, visible: bool) {
        unsafe {
            // Safety:
            // - `control` is a live child HWND.
            ShowWindow(control, if visible { SW_SHOW } else { SW_HIDE });
        }
    }

    fn set_control_text(control: HWND, text: &str) {
        let wide = to_wide(text);
        unsafe {
            // Safety:
            // - `control` is a live child HWND and UTF-16 pointer is valid for call.
            SetWindowTextW(control, wide.as_ptr());
        }
    }

    fn read_control_text(control: HWND) -> Result<String, AppError> {
        let length = unsafe {
            // Safety:
            // - `control` is a valid edit control handle.
            GetWindowTextLengthW(control)
        };
        if length < 0 {
            return Err(AppError::Platform("GetWindowTextLengthW failed".to_string()));
        }

        let mut buffer = vec![0_u16; length as usize + 1];
        let written = unsafe {
            // Safety:
            // - Buffer is large enough for text + null terminator.
            GetWindowTextW(control, buffer.as_mut_ptr(), buffer.len() as i32)
        };
        if written < 0 {
            return Err(AppError::Platform("GetWindowTextW failed".to_string()));
        }

        Ok(String::from_utf16_lossy(&buffer[..written as usize]))
    }

    fn with_shell<F, T>(f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut ShellController) -> Result<T, AppError>,
    {
        SHELL.with(|slot| {
            let mut maybe_shell = slot
                .try_borrow_mut()
                .map_err(|_| AppError::from(HostError::Reentrant))?;
            let shell = maybe_shell
                .as_mut()
                .ok_or_else(|| AppError::Platform("shell is not initialized".to_string()))?;
            f(shell)
        })
    }

    fn platform_error(action: &str, detail: &str) -> AppError {
        log_error("platform", action, detail);
        AppError::Platform(detail.to_string())
    }

    fn log_error(stage: &str, action: &str, detail: &str) {
        tracing::error!(stage, action, detail = %redact_sensitive(detail));
    }

    fn loword(value: usize) -> u16 {
        (value & 0xFFFF) as u16
    }

    fn hiword(value: usize) -> u16 {
        ((value >> 16) & 0xFFFF) as u16
    }

    fn to_wide(value: &str) -> Vec<u16> {
        value.encode_utf16().chain(std::iter::once(0)).collect()
    }
}
