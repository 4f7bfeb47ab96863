pub struct InviteMessage {}

impl InviteMessage {
    pub fn generate(budget_name: &str, inviter_name: &str, accept_url: &str) -> String {
        format!(
            "<html>
               <head>
                 <style>
                   body {{
                     font-family: Arial, sans-serif;
                     text-align: center;
                   }}
                 </style>
               </head>
             <body>
               <h1>You have been invited to share a budget</h1>
               <p><b>{}</b> invited you to join <b>{}</b> and split its costs.</p>
               <p><a href=\"{}\">Accept the invitation</a></p>
               <p>If you were not expecting this invitation, you can safely
               ignore this email.</p>
             </body>
             </html>",
            inviter_name, budget_name, accept_url,
        )
    }
}
