/// One `tokio::select!` round of a watch loop.
///
/// `continue`s when any of the futures resolves to `Ok`, `break`s when one
/// resolves to `Err` or on Ctrl-C. The loop label is only used for logging:
///
/// ```ignore
/// loop {
///     publish().await;
///     select_continue!("snapshots"; rx.changed(), resync.tick_ok());
/// }
/// ```
#[macro_export]
macro_rules! select_continue {
    ($label:expr; $($fut:expr),+ $(,)?) => {{
        tokio::select! {
            $(
                res = $fut => match res {
                    Ok(_) => continue,
                    Err(err) => {
                        tracing::debug!("Loop {} stopping: {}", $label, err);
                        break;
                    }
                },
            )+
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Loop {} received Ctrl-C", $label);
                break;
            }
        };
    }};
}
